use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{source_name}: fetch failed: {message}")]
    SourceFetch {
        source_name: String,
        message: String,
    },

    #[error("{source_name}: fetch timed out after {secs}s")]
    SourceTimeout { source_name: String, secs: u64 },

    #[error("Every source failed: {}", .0.join("; "))]
    AllSourcesFailed(Vec<String>),

    #[error("Malformed record {record}: {reason}")]
    MalformedRecord { record: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Persisted state {path} is unreadable: {reason}")]
    PersistedStateCorrupt { path: PathBuf, reason: String },

    #[error("Unknown rank '{0}' (expected pin, high, normal or low)")]
    UnknownRank(String),

    #[error("Item id must not be empty")]
    EmptyId,

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn malformed(record: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            record: record.into(),
            reason: reason.into(),
        }
    }
}
