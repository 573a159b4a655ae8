use crate::fields::Platform;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::permissions;
use crate::reconcile::{self, SaveError, SaveOutcome};
use crate::record;
use serde_json::json;

/// One save endpoint for every platform screen: permission-gated diff,
/// atomic row update, then retirement of the highlighted requests that
/// actually changed.
fn handle_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(session) = state.session.as_ref() else {
        return err(&req.id, "no_session", "sign in first", None);
    };

    let platform = match req.params.get("group").and_then(|v| v.as_str()) {
        Some(g) => match Platform::parse(g) {
            Some(p) => p,
            None => return err(&req.id, "bad_params", format!("unknown group: {}", g), None),
        },
        None => return err(&req.id, "bad_params", "missing group", None),
    };
    if platform == Platform::Codeforces {
        // Codeforces numbers never reach the student row; the shells keep
        // them in the stash.
        return err(
            &req.id,
            "bad_params",
            "codeforces stats are device-local; use stash.set",
            None,
        );
    }
    let Some(working) = req.params.get("values").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "values must be an object", None);
    };
    let highlight: Vec<String> = req
        .params
        .get("highlight")
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default();

    let original = match record::fetch_by_identity(conn, &session.email) {
        Ok(Some(r)) => r,
        Ok(None) => {
            return err(
                &req.id,
                "not_found",
                format!("no student record linked to {}", session.email),
                None,
            )
        }
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let perms = permissions::load(conn);
    match reconcile::save_group(conn, platform, &original, working, &perms, &highlight) {
        Ok(SaveOutcome::NothingToSave) => ok(
            &req.id,
            json!({ "outcome": "nothing_to_save", "student": original.to_json() }),
        ),
        Ok(SaveOutcome::Saved {
            record,
            required_updated,
        }) => {
            let required_count = required_updated.len();
            ok(
                &req.id,
                json!({
                    "outcome": "saved",
                    "student": record.to_json(),
                    "requiredUpdated": required_updated,
                    "requiredCount": required_count,
                }),
            )
        }
        Err(SaveError::BadValue { field, message }) => err(
            &req.id,
            "bad_params",
            message,
            Some(json!({ "field": field })),
        ),
        Err(SaveError::NotFound) => err(
            &req.id,
            "not_found",
            "no rows updated; the student row no longer matches this identity",
            None,
        ),
        Err(SaveError::Db(message)) => err(&req.id, "db_update_failed", message, None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "profile.save" => Some(handle_save(state, req)),
        _ => None,
    }
}
