use crate::db::{self, quote_ident};
use crate::fields::{self, FieldKind, FieldValue};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::record::normalize_email;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn to_sql(v: &FieldValue) -> SqlValue {
    match v {
        FieldValue::Null => SqlValue::Null,
        FieldValue::Int(n) => SqlValue::Integer(*n),
        FieldValue::Real(x) => SqlValue::Real(*x),
        FieldValue::Text(s) => SqlValue::Text(s.clone()),
    }
}

/// Seed or patch a student row. This is the surface the external
/// administration tooling owns; the portal itself never creates rows.
fn handle_students_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(values) = req.params.get("values").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "values must be an object", None);
    };
    if values.is_empty() {
        return err(&req.id, "bad_params", "values must not be empty", None);
    }

    let columns = match db::student_columns(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut patch: Vec<(String, FieldValue)> = Vec::new();
    for (field, value) in values {
        if !columns.iter().any(|c| c == field) {
            return err(
                &req.id,
                "bad_params",
                format!("unknown student field: {}", field),
                None,
            );
        }
        let kind = fields::field_kind(field).unwrap_or(FieldKind::Text);
        match fields::typed_from_json(kind, value) {
            Ok(v) => patch.push((field.clone(), v)),
            Err(message) => {
                return err(
                    &req.id,
                    "bad_params",
                    message,
                    Some(json!({ "field": field.clone() })),
                )
            }
        }
    }

    // Prefer an explicit id; otherwise reuse the row matching the official
    // mail so reseeding stays idempotent.
    let explicit_id = req
        .params
        .get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let existing_id = match explicit_id {
        Some(id) => Some(id),
        None => {
            let mail = values
                .get("OFFICIAL_MAIL")
                .and_then(|v| v.as_str())
                .map(normalize_email);
            match mail {
                Some(mail) => {
                    let found: Result<Option<String>, _> = conn
                        .query_row(
                            "SELECT id FROM students WHERE lower(trim(\"OFFICIAL_MAIL\")) = ?",
                            [&mail],
                            |r| r.get(0),
                        )
                        .optional();
                    match found {
                        Ok(v) => v,
                        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
                    }
                }
                None => None,
            }
        }
    };

    match existing_id {
        Some(student_id) => {
            let set_list: Vec<String> = patch
                .iter()
                .map(|(f, _)| format!("{} = ?", quote_ident(f)))
                .collect();
            let mut params: Vec<SqlValue> = patch.iter().map(|(_, v)| to_sql(v)).collect();
            params.push(SqlValue::Text(student_id.clone()));
            let affected = conn.execute(
                &format!("UPDATE students SET {} WHERE id = ?", set_list.join(", ")),
                params_from_iter(params),
            );
            match affected {
                Ok(0) => err(&req.id, "not_found", "student not found", None),
                Ok(_) => ok(&req.id, json!({ "studentId": student_id })),
                Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
            }
        }
        None => {
            let student_id = Uuid::new_v4().to_string();
            let col_list: Vec<String> = std::iter::once("id".to_string())
                .chain(patch.iter().map(|(f, _)| quote_ident(f)))
                .collect();
            let placeholders: Vec<&str> = col_list.iter().map(|_| "?").collect();
            let mut params: Vec<SqlValue> = vec![SqlValue::Text(student_id.clone())];
            params.extend(patch.iter().map(|(_, v)| to_sql(v)));
            if let Err(e) = conn.execute(
                &format!(
                    "INSERT INTO students({}) VALUES({})",
                    col_list.join(", "),
                    placeholders.join(", ")
                ),
                params_from_iter(params),
            ) {
                return err(
                    &req.id,
                    "db_insert_failed",
                    e.to_string(),
                    Some(json!({ "table": "students" })),
                );
            }
            ok(&req.id, json!({ "studentId": student_id }))
        }
    }
}

fn handle_permissions_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let field_name = match req.params.get("fieldName").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing fieldName", None),
    };
    let Some(editable) = req.params.get("editable").and_then(|v| v.as_bool()) else {
        return err(&req.id, "bad_params", "editable must be boolean", None);
    };
    let category = req
        .params
        .get("category")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    if let Err(e) = conn.execute(
        "INSERT INTO field_permissions(field_name, editable, category)
         VALUES(?, ?, ?)
         ON CONFLICT(field_name) DO UPDATE SET
           editable = excluded.editable,
           category = excluded.category",
        (&field_name, editable as i64, &category),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "field_permissions" })),
        );
    }
    ok(&req.id, json!({ "fieldName": field_name, "editable": editable }))
}

fn handle_requests_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let section = match req.params.get("section").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_uppercase(),
        _ => return err(&req.id, "bad_params", "missing section", None),
    };
    let field_label = match req.params.get("fieldLabel").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing fieldLabel", None),
    };
    let note = req
        .params
        .get("note")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let request_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO field_update_requests(id, section, field_label, note, created_at)
         VALUES(?, ?, ?, ?, ?)",
        (
            &request_id,
            &section,
            &field_label,
            &note,
            chrono::Utc::now().to_rfc3339(),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "field_update_requests" })),
        );
    }
    ok(&req.id, json!({ "requestId": request_id }))
}

fn handle_requests_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "requests": [] }));
    };
    let section = req.params.get("section").and_then(|v| v.as_str());

    let mut sql = "SELECT id, section, field_label, note, created_at
         FROM field_update_requests"
        .to_string();
    let mut params: Vec<String> = Vec::new();
    if let Some(section) = section {
        sql.push_str(" WHERE section = ?");
        params.push(section.trim().to_uppercase());
    }
    sql.push_str(" ORDER BY rowid");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "section": row.get::<_, String>(1)?,
                "field_label": row.get::<_, String>(2)?,
                "note": row.get::<_, Option<String>>(3)?,
                "created_at": row.get::<_, Option<String>>(4)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(requests) => ok(&req.id, json!({ "requests": requests })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_requests_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let request_id = match req.params.get("id").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing id", None),
    };
    match conn.execute(
        "DELETE FROM field_update_requests WHERE id = ?",
        [&request_id],
    ) {
        Ok(0) => err(&req.id, "not_found", "request not found", None),
        Ok(_) => ok(&req.id, json!({ "deleted": true })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

fn handle_profiles_set_role(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let user_id = match req.params.get("userId").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing userId", None),
    };
    let role = match req.params.get("role").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_uppercase(),
        _ => return err(&req.id, "bad_params", "missing role", None),
    };
    if let Err(e) = conn.execute(
        "INSERT INTO profiles(user_id, role) VALUES(?, ?)
         ON CONFLICT(user_id) DO UPDATE SET role = excluded.role",
        (&user_id, &role),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "profiles" })),
        );
    }
    ok(&req.id, json!({ "userId": user_id, "role": role }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "admin.students.upsert" => Some(handle_students_upsert(state, req)),
        "admin.permissions.set" => Some(handle_permissions_set(state, req)),
        "admin.requests.create" => Some(handle_requests_create(state, req)),
        "admin.requests.list" => Some(handle_requests_list(state, req)),
        "admin.requests.delete" => Some(handle_requests_delete(state, req)),
        "admin.profiles.setRole" => Some(handle_profiles_set_role(state, req)),
        _ => None,
    }
}
