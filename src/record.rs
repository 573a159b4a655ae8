use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;

use crate::db::{self, quote_ident};
use crate::fields::FieldValue;

/// One student row. `values` holds every data column of the table, catalog
/// or not, so externally-added columns survive a read-modify-write cycle.
#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub id: String,
    pub values: BTreeMap<String, FieldValue>,
}

impl StudentRecord {
    pub fn value(&self, field: &str) -> FieldValue {
        self.values.get(field).cloned().unwrap_or(FieldValue::Null)
    }

    /// Non-empty trimmed text of a field, for identity lookups
    /// (SECTION, REGNO).
    pub fn text(&self, field: &str) -> Option<String> {
        let s = self.value(field).display_string();
        let t = s.trim().to_string();
        if t.is_empty() {
            None
        } else {
            Some(t)
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert("id".to_string(), json!(self.id.clone()));
        for (field, value) in &self.values {
            obj.insert(field.clone(), value.to_json());
        }
        serde_json::Value::Object(obj)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn value_from_sql(v: SqlValue) -> FieldValue {
    match v {
        SqlValue::Null => FieldValue::Null,
        SqlValue::Integer(n) => FieldValue::Int(n),
        SqlValue::Real(x) => FieldValue::Real(x),
        SqlValue::Text(s) => FieldValue::Text(s),
        // No blob columns exist; anything unexpected reads as unset.
        SqlValue::Blob(_) => FieldValue::Null,
    }
}

fn value_to_sql(v: &FieldValue) -> SqlValue {
    match v {
        FieldValue::Null => SqlValue::Null,
        FieldValue::Int(n) => SqlValue::Integer(*n),
        FieldValue::Real(x) => SqlValue::Real(*x),
        FieldValue::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn fetch_one(
    conn: &Connection,
    columns: &[String],
    where_clause: &str,
    param: &str,
) -> anyhow::Result<Option<StudentRecord>> {
    let select_list: Vec<String> = std::iter::once("id".to_string())
        .chain(columns.iter().map(|c| quote_ident(c)))
        .collect();
    let sql = format!(
        "SELECT {} FROM students WHERE {} LIMIT 1",
        select_list.join(", "),
        where_clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row([param], |row| {
            let id: String = row.get(0)?;
            let mut values = BTreeMap::new();
            for (i, col) in columns.iter().enumerate() {
                let v: SqlValue = row.get(i + 1)?;
                values.insert(col.clone(), value_from_sql(v));
            }
            Ok(StudentRecord { id, values })
        })
        .optional()?;
    Ok(row)
}

/// Look up the one student row for a signed-in identity. Email is
/// normalized (trim + lowercase); the official-mail column is tried first,
/// then the plain email fallback. No row is a valid, displayed state.
pub fn fetch_by_identity(conn: &Connection, email: &str) -> anyhow::Result<Option<StudentRecord>> {
    let normalized = normalize_email(email);
    let columns = db::student_columns(conn)?;
    if let Some(r) = fetch_one(
        conn,
        &columns,
        "lower(trim(\"OFFICIAL_MAIL\")) = ?",
        &normalized,
    )? {
        return Ok(Some(r));
    }
    fetch_one(conn, &columns, "lower(trim(\"EMAIL\")) = ?", &normalized)
}

pub fn fetch_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<StudentRecord>> {
    let columns = db::student_columns(conn)?;
    fetch_one(conn, &columns, "id = ?", id)
}

/// Zero rows affected is its own case: it points at an identity/row-matching
/// defect, not at the transport.
#[derive(Debug)]
pub enum UpdateError {
    NotFound,
    Db(String),
}

/// Apply a staged patch to one row. The row is resolved by primary key
/// first; if that matches nothing (stale id), one retry goes through the
/// normalized official-mail key before reporting NotFound. Last write wins.
pub fn update(
    conn: &Connection,
    record: &StudentRecord,
    patch: &[(String, FieldValue)],
) -> Result<StudentRecord, UpdateError> {
    if patch.is_empty() {
        return Err(UpdateError::Db("empty patch".to_string()));
    }

    let set_list: Vec<String> = patch
        .iter()
        .map(|(field, _)| format!("{} = ?", quote_ident(field)))
        .collect();
    let sql_base = format!(
        "UPDATE students SET {}, updated_at = ? WHERE ",
        set_list.join(", ")
    );
    let updated_at = chrono::Utc::now().to_rfc3339();

    let run = |where_clause: &str, key: &str| -> Result<usize, UpdateError> {
        let mut params: Vec<SqlValue> = patch.iter().map(|(_, v)| value_to_sql(v)).collect();
        params.push(SqlValue::Text(updated_at.clone()));
        params.push(SqlValue::Text(key.to_string()));
        conn.execute(&format!("{}{}", sql_base, where_clause), params_from_iter(params))
            .map_err(|e| UpdateError::Db(e.to_string()))
    };

    let mut affected = run("id = ?", &record.id)?;
    if affected == 0 {
        if let Some(mail) = record.text("OFFICIAL_MAIL") {
            affected = run(
                "lower(trim(\"OFFICIAL_MAIL\")) = ?",
                &normalize_email(&mail),
            )?;
        }
    }
    if affected == 0 {
        return Err(UpdateError::NotFound);
    }

    match fetch_by_id(conn, &record.id) {
        Ok(Some(updated)) => Ok(updated),
        Ok(None) => {
            // Updated through the email fallback under a different id.
            match record
                .text("OFFICIAL_MAIL")
                .map(|m| fetch_by_identity(conn, &m))
            {
                Some(Ok(Some(updated))) => Ok(updated),
                _ => Err(UpdateError::NotFound),
            }
        }
        Err(e) => Err(UpdateError::Db(e.to_string())),
    }
}
