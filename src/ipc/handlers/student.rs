use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::record;
use serde_json::json;

/// The signed-in student's row. An identity with no matching row is a valid
/// displayed state (`student: null`), and a failed lookup degrades the same
/// way rather than erroring past the screen.
fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(session) = state.session.as_ref() else {
        return err(&req.id, "no_session", "sign in first", None);
    };

    match record::fetch_by_identity(conn, &session.email) {
        Ok(Some(student)) => ok(&req.id, json!({ "student": student.to_json() })),
        Ok(None) | Err(_) => ok(&req.id, json!({ "student": null })),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "student.get" => Some(handle_get(state, req)),
        _ => None,
    }
}
