use thiserror::Error;
use uuid::Uuid;

/// Failures of the task store. None of these are fatal; the in-memory
/// sequence is left consistent whenever one is returned.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("failed to encode tasks: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode stored tasks: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("task {0} already exists")]
    DuplicateId(Uuid),

    #[error("task {0} not found")]
    NotFound(Uuid),

    #[error("index {index} out of range for {len} tasks")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("notifications are not authorized")]
    NotAuthorized,

    #[error("reminder date {0} is not in the future")]
    InPast(chrono::DateTime<chrono::Utc>),

    #[error("task {0} has no reminder date")]
    NoReminder(Uuid),

    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),

    #[error("notification service error: {0}")]
    Host(String),
}

impl From<rusqlite::Error> for SchedulingError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Host(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
