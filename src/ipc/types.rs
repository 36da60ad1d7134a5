use std::path::PathBuf;

use crate::config::Config;
use crate::snapshot::FlushTarget;
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub config: Config,
    /// Shared with the snapshot thread; set when a workspace opens.
    pub flush_target: FlushTarget,
}

impl AppState {
    pub fn new(config: Config, flush_target: FlushTarget) -> Self {
        Self {
            workspace: None,
            db: None,
            config,
            flush_target,
        }
    }
}
