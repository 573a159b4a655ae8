use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::permissions;
use serde_json::json;

/// Full permission map for the edit surfaces. Load is fail-soft: a broken
/// or missing table reads as an empty map, which locks everything.
fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "permissions": {} }));
    };
    let map = permissions::load(conn);
    let mut obj = serde_json::Map::new();
    for (field, perm) in &map {
        obj.insert(
            field.clone(),
            json!({ "editable": perm.editable, "category": perm.category.clone() }),
        );
    }
    ok(&req.id, json!({ "permissions": obj }))
}

/// Whether any of the listed fields is editable; the shells use this to
/// show or hide the Edit affordance.
fn handle_check(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(field_list) = req.params.get("fields").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "fields must be an array", None);
    };
    let fields: Vec<&str> = field_list.iter().filter_map(|v| v.as_str()).collect();

    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "canEdit": false }));
    };
    let map = permissions::load(conn);
    let editable: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|f| permissions::is_editable(&map, f))
        .collect();
    ok(
        &req.id,
        json!({
            "canEdit": permissions::has_any_editable(&map, fields.iter().copied()),
            "editableFields": editable
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "permissions.get" => Some(handle_get(state, req)),
        "permissions.check" => Some(handle_check(state, req)),
        _ => None,
    }
}
