use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Small device-local values the shells persist across restarts: the theme
/// preference, and Codeforces stats (which never reach the student row).
const ALLOWED_KEYS: &[&str] = &["theme", "codeforces.stats"];

fn stash_key(key: &str) -> String {
    format!("stash.{}", key)
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let key = match req.params.get("key").and_then(|v| v.as_str()) {
        Some(k) if ALLOWED_KEYS.contains(&k) => k.to_string(),
        Some(k) => return err(&req.id, "bad_params", format!("unknown stash key: {}", k), None),
        None => return err(&req.id, "bad_params", "missing key", None),
    };
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "value": null }));
    };
    let value = db::settings_get_json(conn, &stash_key(&key))
        .ok()
        .flatten()
        .unwrap_or(serde_json::Value::Null);
    ok(&req.id, json!({ "value": value }))
}

fn handle_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let key = match req.params.get("key").and_then(|v| v.as_str()) {
        Some(k) if ALLOWED_KEYS.contains(&k) => k.to_string(),
        Some(k) => return err(&req.id, "bad_params", format!("unknown stash key: {}", k), None),
        None => return err(&req.id, "bad_params", "missing key", None),
    };
    let Some(value) = req.params.get("value") else {
        return err(&req.id, "bad_params", "missing value", None);
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = db::settings_set_json(conn, &stash_key(&key), value) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "key": key }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "stash.get" => Some(handle_get(state, req)),
        "stash.set" => Some(handle_set(state, req)),
        _ => None,
    }
}
