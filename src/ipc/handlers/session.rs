use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request, Session};
use crate::record::normalize_email;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

const DEFAULT_ALLOWED_DOMAIN: &str = "citchennai.net";
const LAST_IDENTITY_KEY: &str = "session.lastIdentity";
const STUDENT_ROLE: &str = "STUDENT";

fn allowed_domain(conn: &Connection) -> String {
    db::settings_get_json(conn, "auth.allowedDomain")
        .ok()
        .flatten()
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| DEFAULT_ALLOWED_DOMAIN.to_string())
}

fn role_for(conn: &Connection, user_id: &str) -> Option<String> {
    conn.query_row(
        "SELECT role FROM profiles WHERE user_id = ?",
        [user_id],
        |r| r.get::<_, String>(0),
    )
    .optional()
    .ok()
    .flatten()
    .map(|r| r.to_uppercase())
}

/// Validate a shell-supplied identity against the org domain and the
/// STUDENT role. A rejection here is final: the identity never reaches
/// data logic.
fn validate_identity(
    conn: &Connection,
    user_id: &str,
    email: &str,
) -> Result<Session, &'static str> {
    let normalized = normalize_email(email);
    let domain = allowed_domain(conn);
    if !normalized.ends_with(&format!("@{}", domain)) {
        return Err("email domain not allowed");
    }
    match role_for(conn, user_id) {
        Some(role) if role == STUDENT_ROLE => Ok(Session {
            user_id: user_id.to_string(),
            email: normalized,
        }),
        _ => Err("account is not a student account"),
    }
}

fn clear_session(state: &mut AppState) {
    state.session = None;
    state.dismissed.clear();
}

fn handle_sign_in(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let user_id = match req.params.get("userId").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing userId", None),
    };
    let email = match req.params.get("email").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => return err(&req.id, "bad_params", "missing email", None),
    };

    match validate_identity(conn, &user_id, &email) {
        Ok(session) => {
            let _ = db::settings_set_json(
                conn,
                LAST_IDENTITY_KEY,
                &json!({ "userId": session.user_id.clone(), "email": session.email.clone() }),
            );
            let result =
                json!({ "userId": session.user_id.clone(), "email": session.email.clone() });
            state.session = Some(session);
            // A fresh sign-in starts with a clean dismissal slate.
            state.dismissed.clear();
            ok(&req.id, result)
        }
        Err(reason) => {
            clear_session(state);
            err(&req.id, "unauthorized", reason, None)
        }
    }
}

fn handle_sign_out(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(conn) = state.db.as_ref() {
        let _ = db::settings_delete(conn, LAST_IDENTITY_KEY);
    }
    clear_session(state);
    ok(&req.id, json!({ "signedIn": false }))
}

/// Re-enter the cached identity from a previous run. Domain and role are
/// re-validated; a since-revoked account reads as signed out.
fn handle_restore(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let cached = db::settings_get_json(conn, LAST_IDENTITY_KEY)
        .ok()
        .flatten();
    let Some(cached) = cached else {
        return ok(&req.id, json!({ "signedIn": false }));
    };
    let user_id = cached.get("userId").and_then(|v| v.as_str()).unwrap_or("");
    let email = cached.get("email").and_then(|v| v.as_str()).unwrap_or("");
    match validate_identity(conn, user_id, email) {
        Ok(session) => {
            let result = json!({
                "signedIn": true,
                "userId": session.user_id.clone(),
                "email": session.email.clone()
            });
            state.session = Some(session);
            state.dismissed.clear();
            ok(&req.id, result)
        }
        Err(_) => {
            let _ = db::settings_delete(conn, LAST_IDENTITY_KEY);
            clear_session(state);
            ok(&req.id, json!({ "signedIn": false }))
        }
    }
}

fn handle_current(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.session.as_ref() {
        Some(s) => ok(
            &req.id,
            json!({ "signedIn": true, "userId": s.user_id.clone(), "email": s.email.clone() }),
        ),
        None => ok(&req.id, json!({ "signedIn": false })),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.signIn" => Some(handle_sign_in(state, req)),
        "session.signOut" => Some(handle_sign_out(state, req)),
        "session.restore" => Some(handle_restore(state, req)),
        "session.current" => Some(handle_current(state, req)),
        _ => None,
    }
}
