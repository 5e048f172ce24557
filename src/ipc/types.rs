use crate::config::Config;
use crate::session::QuizSession;
use rusqlite::Connection;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// In-progress quiz sessions keyed by session id.
    pub sessions: HashMap<String, QuizSession>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            workspace: None,
            db: None,
            sessions: HashMap::new(),
        }
    }
}
