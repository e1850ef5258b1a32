use thiserror::Error;

/// Errors surfaced by the sync engine and its collaborators. None of them is
/// fatal: callers degrade functionality and keep the session alive.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("backend returned {status} for {endpoint}")]
    Status {
        status: reqwest::StatusCode,
        endpoint: String,
    },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("channel unavailable: {0}")]
    Channel(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no identity is logged in")]
    NotLoggedIn,
}

pub type Result<T> = std::result::Result<T, SyncError>;
