use rusqlite::Connection;
use serde_json::json;
use std::collections::{HashSet, HashMap};

use crate::fields::{self, Platform};

/// An advisor's ask that every student of a section update one field.
/// Created externally; the portal only reads it and records completions.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub id: String,
    pub section: String,
    pub field_label: String,
    pub note: Option<String>,
    pub created_at: Option<String>,
}

impl UpdateRequest {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id.clone(),
            "section": self.section.clone(),
            "field_label": self.field_label.clone(),
            "note": self.note.clone(),
            "created_at": self.created_at.clone(),
        })
    }
}

pub fn normalize_section(section: &str) -> String {
    section.trim().to_uppercase()
}

/// All requests addressed to a section, case-insensitively, in source order.
/// A student with no section sees nothing; the caller short-circuits before
/// getting here.
pub fn fetch_requests(conn: &Connection, section: &str) -> anyhow::Result<Vec<UpdateRequest>> {
    let normalized = normalize_section(section);
    let mut stmt = conn.prepare(
        "SELECT id, section, field_label, note, created_at
         FROM field_update_requests
         WHERE section = ?
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([&normalized], |row| {
            Ok(UpdateRequest {
                id: row.get(0)?,
                section: row.get(1)?,
                field_label: row.get(2)?,
                note: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Labels this student has already completed, uppercased for matching.
pub fn fetch_completed_labels(
    conn: &Connection,
    section: &str,
    reg_no: &str,
) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT field_label FROM field_update_completions
         WHERE section = ? AND reg_no = ?
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map(
            [&normalize_section(section), &reg_no.trim().to_string()],
            |row| row.get::<_, String>(0),
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().map(|l| l.to_uppercase()).collect())
}

/// The active notification set: requests minus completed labels minus
/// session-dismissed ids, preserving source order.
pub fn active<'a>(
    requests: &'a [UpdateRequest],
    completed: &HashSet<String>,
    dismissed: &HashSet<String>,
) -> Vec<&'a UpdateRequest> {
    requests
        .iter()
        .filter(|r| !completed.contains(&r.field_label.to_uppercase()))
        .filter(|r| !dismissed.contains(&r.id))
        .collect()
}

/// Record that this student has completed one requested field. Upsert on
/// the (section, reg_no, field_label) triple: re-marking restamps
/// completed_at without duplicating the row.
pub fn mark_complete(
    conn: &Connection,
    section: &str,
    reg_no: &str,
    field_label: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO field_update_completions(section, reg_no, field_label, completed_at)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(section, reg_no, field_label) DO UPDATE SET
           completed_at = excluded.completed_at",
        (
            normalize_section(section),
            reg_no.trim(),
            field_label,
            chrono::Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(())
}

/// Bucket active request labels by display destination, keeping each
/// group's labels in source order.
pub fn group_for_display(labels: &[&str]) -> HashMap<Platform, Vec<String>> {
    let mut groups: HashMap<Platform, Vec<String>> = HashMap::new();
    for label in labels {
        groups
            .entry(fields::classify(label))
            .or_default()
            .push((*label).to_string());
    }
    groups
}
