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

fn request(
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
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

#[test]
fn wrong_domain_and_wrong_role_never_get_a_session() {
    let workspace = temp_dir("arc-session-gate");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // Outside the org domain: rejected before any role lookup.
    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "session.signIn",
        json!({ "userId": "u-1", "email": "alice@gmail.com" }),
    );
    assert_eq!(error_code(&resp), "unauthorized");

    // Right domain, no profile row at all.
    let resp = request(
        &mut stdin,
        &mut reader,
        "3",
        "session.signIn",
        json!({ "userId": "u-1", "email": "alice@citchennai.net" }),
    );
    assert_eq!(error_code(&resp), "unauthorized");

    // Right domain, wrong role.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "admin.profiles.setRole",
        json!({ "userId": "u-1", "role": "ADVISOR" }),
    );
    let resp = request(
        &mut stdin,
        &mut reader,
        "5",
        "session.signIn",
        json!({ "userId": "u-1", "email": "alice@citchennai.net" }),
    );
    assert_eq!(error_code(&resp), "unauthorized");

    // The failed attempts must not have left a session behind.
    let current = request_ok(&mut stdin, &mut reader, "6", "session.current", json!({}));
    assert_eq!(current.get("signedIn").and_then(|v| v.as_bool()), Some(false));

    // Data methods stay gated.
    let resp = request(&mut stdin, &mut reader, "7", "student.get", json!({}));
    assert_eq!(error_code(&resp), "no_session");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn student_role_signs_in_with_normalized_email() {
    let workspace = temp_dir("arc-session-ok");
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
        json!({ "userId": "u-2", "role": "student" }),
    );

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "session.signIn",
        json!({ "userId": "u-2", "email": "  Bob@CITchennai.net " }),
    );
    assert_eq!(
        result.get("email").and_then(|v| v.as_str()),
        Some("bob@citchennai.net")
    );

    let current = request_ok(&mut stdin, &mut reader, "4", "session.current", json!({}));
    assert_eq!(current.get("signedIn").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        current.get("email").and_then(|v| v.as_str()),
        Some("bob@citchennai.net")
    );

    let signed_out = request_ok(&mut stdin, &mut reader, "5", "session.signOut", json!({}));
    assert_eq!(
        signed_out.get("signedIn").and_then(|v| v.as_bool()),
        Some(false)
    );
    let current = request_ok(&mut stdin, &mut reader, "6", "session.current", json!({}));
    assert_eq!(current.get("signedIn").and_then(|v| v.as_bool()), Some(false));

    let _ = std::fs::remove_dir_all(workspace);
}
