use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_arcd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn arcd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn notification_labels(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
) -> Vec<String> {
    request_ok(stdin, reader, id, "notifications.fetch", json!({}))
        .get("notifications")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|n| n.get("field_label").and_then(|v| v.as_str()))
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn seed_section_a_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &PathBuf,
) {
    let _ = request_ok(
        stdin,
        reader,
        "seed-1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed-2",
        "admin.profiles.setRole",
        json!({ "userId": "u-1", "role": "STUDENT" }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed-3",
        "admin.students.upsert",
        json!({ "values": {
            "NAME": "Alice",
            "REGNO": "R1",
            "SECTION": "A",
            "OFFICIAL_MAIL": "alice@citchennai.net",
            "LC_RATING": 1500,
            "LC_BADGES": 3
        }}),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed-4",
        "session.signIn",
        json!({ "userId": "u-1", "email": "alice@citchennai.net" }),
    );
}

#[test]
fn section_requests_show_until_completed() {
    let workspace = temp_dir("arc-notify-basic");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    seed_section_a_student(&mut stdin, &mut reader, &workspace);

    // Section matching is case-insensitive: the request targets "a".
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "admin.requests.create",
        json!({ "section": "a", "fieldLabel": "LC RATING" }),
    );

    let labels = notification_labels(&mut stdin, &mut reader, "2");
    assert_eq!(labels, ["LC RATING"]);

    // A recorded completion retires it on the next fetch.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "notifications.markComplete",
        json!({ "fieldLabel": "LC RATING" }),
    );
    let labels = notification_labels(&mut stdin, &mut reader, "4");
    assert!(labels.is_empty(), "completed request still active: {:?}", labels);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn saving_a_highlighted_change_retires_the_request() {
    let workspace = temp_dir("arc-notify-retire");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    seed_section_a_student(&mut stdin, &mut reader, &workspace);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "admin.permissions.set",
        json!({ "fieldName": "LC_RATING", "editable": true }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "admin.permissions.set",
        json!({ "fieldName": "LC_BADGES", "editable": true }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "admin.requests.create",
        json!({ "section": "A", "fieldLabel": "LC RATING" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "admin.requests.create",
        json!({ "section": "A", "fieldLabel": "LC BADGES" }),
    );

    let labels = notification_labels(&mut stdin, &mut reader, "5");
    assert_eq!(labels, ["LC RATING", "LC BADGES"]);

    // LC_RATING actually changes; LC_BADGES is resubmitted with its current
    // value. Only the changed field satisfies its request.
    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "profile.save",
        json!({
            "group": "leetcode",
            "values": { "LC_RATING": "1600", "LC_BADGES": "3" },
            "highlight": ["LC RATING", "LC BADGES"]
        }),
    );
    assert_eq!(saved.get("outcome").and_then(|v| v.as_str()), Some("saved"));
    assert_eq!(
        saved.get("requiredUpdated"),
        Some(&json!(["LC RATING"])),
        "only the changed highlighted field counts"
    );
    assert_eq!(saved.get("requiredCount").and_then(|v| v.as_i64()), Some(1));

    let labels = notification_labels(&mut stdin, &mut reader, "7");
    assert_eq!(
        labels,
        ["LC BADGES"],
        "unchanged highlighted request must stay active"
    );

    let completed = request_ok(&mut stdin, &mut reader, "8", "notifications.completed", json!({}));
    assert_eq!(completed.get("fields"), Some(&json!(["LC RATING"])));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn student_without_a_section_sees_no_notifications() {
    let workspace = temp_dir("arc-notify-no-section");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "admin.profiles.setRole",
        json!({ "userId": "u-2", "role": "STUDENT" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "admin.students.upsert",
        json!({ "values": {
            "NAME": "Bob",
            "REGNO": "R2",
            "OFFICIAL_MAIL": "bob@citchennai.net"
        }}),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "admin.requests.create",
        json!({ "section": "A", "fieldLabel": "LC RATING" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "session.signIn",
        json!({ "userId": "u-2", "email": "bob@citchennai.net" }),
    );

    let labels = notification_labels(&mut stdin, &mut reader, "6");
    assert!(labels.is_empty());

    let _ = std::fs::remove_dir_all(workspace);
}
