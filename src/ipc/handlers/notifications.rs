use crate::fields::ALL_PLATFORMS;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::notify::{self, UpdateRequest};
use crate::record;
use serde_json::json;
use std::collections::HashSet;

/// The section/reg-no scope the signed-in student's requests are matched
/// under. None whenever anything along the way is missing: the notification
/// surfaces render quietly empty instead of erroring.
fn resolve_scope(state: &AppState) -> Option<(String, Option<String>)> {
    let conn = state.db.as_ref()?;
    let session = state.session.as_ref()?;
    let student = record::fetch_by_identity(conn, &session.email)
        .ok()
        .flatten()?;
    let section = student.text("SECTION")?;
    let reg_no = student.text("REGNO");
    Some((section, reg_no))
}

fn completed_set(state: &AppState, section: &str, reg_no: Option<&str>) -> HashSet<String> {
    let Some(conn) = state.db.as_ref() else {
        return HashSet::new();
    };
    let Some(reg_no) = reg_no else {
        return HashSet::new();
    };
    notify::fetch_completed_labels(conn, section, reg_no)
        .unwrap_or_default()
        .into_iter()
        .collect()
}

/// The active notification set for the current session, owned.
fn active_for(state: &AppState) -> Vec<UpdateRequest> {
    let Some((section, reg_no)) = resolve_scope(state) else {
        return Vec::new();
    };
    let Some(conn) = state.db.as_ref() else {
        return Vec::new();
    };
    let requests = notify::fetch_requests(conn, &section).unwrap_or_default();
    let completed = completed_set(state, &section, reg_no.as_deref());
    notify::active(&requests, &completed, &state.dismissed)
        .into_iter()
        .cloned()
        .collect()
}

fn handle_fetch(state: &mut AppState, req: &Request) -> serde_json::Value {
    let items: Vec<serde_json::Value> = active_for(state).iter().map(|r| r.to_json()).collect();
    ok(&req.id, json!({ "notifications": items }))
}

/// The active set bucketed for the shells' grouped banner: all eight
/// destinations in fixed order, empty groups included.
fn handle_grouped(state: &mut AppState, req: &Request) -> serde_json::Value {
    let active = active_for(state);
    let labels: Vec<&str> = active.iter().map(|r| r.field_label.as_str()).collect();
    let grouped = notify::group_for_display(&labels);
    let groups: Vec<serde_json::Value> = ALL_PLATFORMS
        .iter()
        .map(|p| {
            json!({
                "platform": p.key(),
                "label": p.display_name(),
                "route": p.route(),
                "fields": grouped.get(p).cloned().unwrap_or_default(),
            })
        })
        .collect();
    ok(&req.id, json!({ "groups": groups }))
}

fn handle_completed(state: &mut AppState, req: &Request) -> serde_json::Value {
    let fields = match resolve_scope(state) {
        Some((section, Some(reg_no))) => {
            let Some(conn) = state.db.as_ref() else {
                return ok(&req.id, json!({ "fields": [] }));
            };
            notify::fetch_completed_labels(conn, &section, &reg_no).unwrap_or_default()
        }
        _ => Vec::new(),
    };
    ok(&req.id, json!({ "fields": fields }))
}

fn handle_mark_complete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let field_label = match req.params.get("fieldLabel").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing fieldLabel", None),
    };
    if state.db.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    if state.session.is_none() {
        return err(&req.id, "no_session", "sign in first", None);
    }
    let Some((section, reg_no)) = resolve_scope(state) else {
        return err(&req.id, "bad_params", "student has no section", None);
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = notify::mark_complete(
        conn,
        &section,
        reg_no.as_deref().unwrap_or(""),
        &field_label,
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "field_update_completions" })),
        );
    }
    ok(&req.id, json!({ "fieldLabel": field_label }))
}

/// Bulk completion: the given labels, or every currently active request
/// when none are passed.
fn handle_mark_all_complete(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.db.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    if state.session.is_none() {
        return err(&req.id, "no_session", "sign in first", None);
    }
    let Some((section, reg_no)) = resolve_scope(state) else {
        return err(&req.id, "bad_params", "student has no section", None);
    };

    let labels: Vec<String> = match req.params.get("fieldLabels").and_then(|v| v.as_array()) {
        Some(list) => list
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.to_string())
            .collect(),
        None => active_for(state)
            .iter()
            .map(|r| r.field_label.clone())
            .collect(),
    };

    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    for label in &labels {
        if let Err(e) = notify::mark_complete(
            conn,
            &section,
            reg_no.as_deref().unwrap_or(""),
            label,
        ) {
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "fieldLabel": label.clone() })),
            );
        }
    }
    ok(&req.id, json!({ "count": labels.len() }))
}

/// Session-local only: hides the request until the next sign-in, without
/// recording a completion.
fn handle_dismiss(state: &mut AppState, req: &Request) -> serde_json::Value {
    let request_id = match req.params.get("id").and_then(|v| v.as_str()) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => return err(&req.id, "bad_params", "missing id", None),
    };
    state.dismissed.insert(request_id);
    ok(&req.id, json!({ "dismissed": true }))
}

fn handle_dismiss_all(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ids: Vec<String> = active_for(state).iter().map(|r| r.id.clone()).collect();
    let count = ids.len();
    state.dismissed.extend(ids);
    ok(&req.id, json!({ "dismissedCount": count }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "notifications.fetch" => Some(handle_fetch(state, req)),
        "notifications.grouped" => Some(handle_grouped(state, req)),
        "notifications.completed" => Some(handle_completed(state, req)),
        "notifications.markComplete" => Some(handle_mark_complete(state, req)),
        "notifications.markAllComplete" => Some(handle_mark_all_complete(state, req)),
        "notifications.dismiss" => Some(handle_dismiss(state, req)),
        "notifications.dismissAll" => Some(handle_dismiss_all(state, req)),
        _ => None,
    }
}
