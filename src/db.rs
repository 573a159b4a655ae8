use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::fields::{self, FieldKind};

pub const DB_FILE_NAME: &str = "arc.sqlite3";

/// Quote a column identifier. Several catalog fields start with a digit
/// (10TH_BOARD_MARKS), so every generated statement quotes its columns.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "TEXT",
        FieldKind::Integer => "INTEGER",
        FieldKind::Decimal => "REAL",
    }
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    let mut columns = vec!["id TEXT PRIMARY KEY".to_string()];
    for (name, kind) in fields::catalog() {
        columns.push(format!("{} {}", quote_ident(name), sql_type(kind)));
    }
    columns.push("updated_at TEXT".to_string());
    conn.execute(
        &format!("CREATE TABLE IF NOT EXISTS students({})", columns.join(", ")),
        [],
    )?;
    // Workspaces created before a catalog field existed get the column added.
    ensure_students_catalog_columns(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_official_mail ON students(\"OFFICIAL_MAIL\")",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_email ON students(\"EMAIL\")",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS field_permissions(
            field_name TEXT PRIMARY KEY,
            editable INTEGER NOT NULL,
            category TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS field_update_requests(
            id TEXT PRIMARY KEY,
            section TEXT NOT NULL COLLATE NOCASE,
            field_label TEXT NOT NULL,
            note TEXT,
            created_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_field_update_requests_section
         ON field_update_requests(section)",
        [],
    )?;

    // The conflict key is the whole triple; NOCASE keeps re-marks with
    // different casing from duplicating a completion.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS field_update_completions(
            section TEXT NOT NULL COLLATE NOCASE,
            reg_no TEXT NOT NULL COLLATE NOCASE,
            field_label TEXT NOT NULL COLLATE NOCASE,
            completed_at TEXT NOT NULL,
            PRIMARY KEY(section, reg_no, field_label)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS profiles(
            user_id TEXT PRIMARY KEY,
            role TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_students_catalog_columns(conn: &Connection) -> anyhow::Result<()> {
    for (name, kind) in fields::catalog() {
        if !table_has_column(conn, "students", name)? {
            conn.execute(
                &format!(
                    "ALTER TABLE students ADD COLUMN {} {}",
                    quote_ident(name),
                    sql_type(kind)
                ),
                [],
            )?;
        }
    }
    Ok(())
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Every data column of the students table, in table order. Columns beyond
/// the catalog (added by external tooling) are included so reads and patches
/// can still reach them.
pub fn student_columns(conn: &Connection) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare("PRAGMA table_info(students)")?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name != "id" && name != "updated_at" {
            out.push(name);
        }
    }
    Ok(out)
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

pub fn settings_delete(conn: &Connection, key: &str) -> anyhow::Result<()> {
    conn.execute("DELETE FROM settings WHERE key = ?", [key])?;
    Ok(())
}
