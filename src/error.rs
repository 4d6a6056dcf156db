use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Error, Debug)]
pub enum TrackerError {
    // Storage errors
    #[error("pattern document at {} is corrupt: {source}", path.display())]
    CorruptData {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write pattern document to {}: {source}", path.display())]
    PersistenceWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Caller errors
    #[error("no active session; start a session before recording events")]
    NoActiveSession,

    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: &'static str, reason: String },

    // Runtime
    #[error("ingest queue is closed")]
    IngestClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackerError {
    pub fn invalid(kind: &'static str, reason: impl Into<String>) -> Self {
        TrackerError::InvalidPayload {
            kind,
            reason: reason.into(),
        }
    }

    /// Persistence failures leave the in-memory state updated; callers may
    /// treat the mutation as applied but not yet durable.
    pub fn is_persistence(&self) -> bool {
        matches!(self, TrackerError::PersistenceWrite { .. })
    }
}
