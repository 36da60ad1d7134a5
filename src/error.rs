//! Error types for the classroom store and analytics.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Username already registered.
    #[error("username already exists: {0}")]
    UsernameTaken(String),

    /// Proctoring session no longer accepts flags.
    #[error("proctoring session is completed: {0}")]
    SessionClosed(String),
}

impl Error {
    /// Wire error code used in the `error.code` field of a response.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Database(_) => "db_query_failed",
            Error::Io(_) => "io_failed",
            Error::Json(_) => "bad_json",
            Error::UsernameTaken(_) => "conflict",
            Error::SessionClosed(_) => "session_closed",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
