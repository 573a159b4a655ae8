use rusqlite::Connection;
use std::collections::HashMap;

/// One row of the remotely administered permission table. Only an external
/// administrator writes it; the portal just reads.
#[derive(Debug, Clone)]
pub struct FieldPermission {
    pub editable: bool,
    pub category: String,
}

pub type PermissionMap = HashMap<String, FieldPermission>;

/// Load the whole field -> permission map. Fails soft: any query error
/// yields an empty map, which locks every field.
pub fn load(conn: &Connection) -> PermissionMap {
    let mut map = PermissionMap::new();
    let Ok(mut stmt) =
        conn.prepare("SELECT field_name, editable, category FROM field_permissions")
    else {
        return map;
    };
    let rows = stmt.query_map([], |row| {
        let field: String = row.get(0)?;
        let editable: i64 = row.get(1)?;
        let category: Option<String> = row.get(2)?;
        Ok((
            field,
            FieldPermission {
                editable: editable != 0,
                category: category.unwrap_or_else(|| "general".to_string()),
            },
        ))
    });
    let Ok(rows) = rows else {
        return map;
    };
    for row in rows.flatten() {
        map.insert(row.0, row.1);
    }
    map
}

/// A field missing from the map is locked.
pub fn is_editable(map: &PermissionMap, field: &str) -> bool {
    map.get(field).map(|p| p.editable).unwrap_or(false)
}

/// Whether an Edit affordance should show at all for a field group.
pub fn has_any_editable<'a, I>(map: &PermissionMap, fields: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    fields.into_iter().any(|f| is_editable(map, f))
}
