use rusqlite::Connection;
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::fields::{self, FieldKind, FieldValue, Platform};
use crate::notify;
use crate::permissions::{self, PermissionMap};
use crate::record::{self, StudentRecord, UpdateError};

/// One field staged for persistence, already coerced to its stored type.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedChange {
    pub field: String,
    pub value: FieldValue,
}

#[derive(Debug)]
pub enum SaveError {
    BadValue { field: String, message: String },
    NotFound,
    Db(String),
}

#[derive(Debug)]
pub enum SaveOutcome {
    /// The working copy matched the stored row on every editable field.
    /// Recoverable and user-visible; no write was issued.
    NothingToSave,
    Saved {
        record: StudentRecord,
        /// Advisor-facing labels of fields that were both changed and
        /// highlighted, for the "(N required fields updated)" confirmation.
        required_updated: Vec<String>,
    },
}

/// Compute the minimal patch: a field is staged iff it is editable AND its
/// normalized working value differs from the normalized stored value.
/// Fields outside the editable set never stage, whatever the form holds.
pub fn stage_changes(
    original: &StudentRecord,
    working: &Map<String, Value>,
    editable: &HashSet<String>,
) -> Result<Vec<StagedChange>, SaveError> {
    let mut staged = Vec::new();
    for (field, value) in working {
        if !editable.contains(field.as_str()) {
            continue;
        }
        let before = original.value(field).display_string();
        let after = fields::json_display_string(value);
        if before == after {
            continue;
        }
        let kind = fields::field_kind(field).unwrap_or(FieldKind::Text);
        let typed = fields::typed_from_json(kind, value).map_err(|message| SaveError::BadValue {
            field: field.clone(),
            message,
        })?;
        staged.push(StagedChange {
            field: field.clone(),
            value: typed,
        });
    }
    Ok(staged)
}

/// The save cycle behind every platform screen: gate by permissions, diff,
/// persist one atomic row update, then retire the highlighted requests that
/// were actually changed. A highlighted field the student did not change is
/// left pending; re-saving with a change is what clears it.
pub fn save_group(
    conn: &Connection,
    platform: Platform,
    original: &StudentRecord,
    working: &Map<String, Value>,
    perms: &PermissionMap,
    highlight_labels: &[String],
) -> Result<SaveOutcome, SaveError> {
    let editable: HashSet<String> = fields::group_fields(platform)
        .iter()
        .filter(|(name, _)| permissions::is_editable(perms, name))
        .map(|(name, _)| name.to_string())
        .collect();

    let staged = stage_changes(original, working, &editable)?;
    if staged.is_empty() {
        return Ok(SaveOutcome::NothingToSave);
    }

    let patch: Vec<(String, FieldValue)> = staged
        .iter()
        .map(|c| (c.field.clone(), c.value.clone()))
        .collect();
    let updated = record::update(conn, original, &patch).map_err(|e| match e {
        UpdateError::NotFound => SaveError::NotFound,
        UpdateError::Db(msg) => SaveError::Db(msg),
    })?;

    let highlighted: HashSet<String> = highlight_labels
        .iter()
        .map(|l| fields::label_to_field(platform, l))
        .collect();

    let mut required_updated = Vec::new();
    if let (Some(section), reg_no) = (updated.text("SECTION"), updated.text("REGNO")) {
        let reg_no = reg_no.unwrap_or_default();
        for change in &staged {
            if !highlighted.contains(&change.field) {
                continue;
            }
            let label = fields::field_to_label(&change.field);
            // Completion upsert failures are absorbed: the request simply
            // stays active and the next save retries it.
            let _ = notify::mark_complete(conn, &section, &reg_no, &label);
            required_updated.push(label);
        }
    }

    Ok(SaveOutcome::Saved {
        record: updated,
        required_updated,
    })
}
