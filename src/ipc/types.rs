use std::collections::HashSet;
use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The identity handed over by the shell after the external OAuth handshake,
/// already validated against the org domain and the STUDENT role.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    /// Normalized (trimmed, lowercased).
    pub email: String,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: Option<Session>,
    /// Request ids dismissed this session. Never persisted: dismissal
    /// suppresses display only and never creates a completion.
    pub dismissed: HashSet<String>,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            workspace: None,
            db: None,
            session: None,
            dismissed: HashSet::new(),
        }
    }
}
