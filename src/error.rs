use thiserror::Error;

/// Failures of the key-value store backing persistence.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("storage is unavailable")]
    Unavailable,

    #[error("failed to read key '{key}': {reason}")]
    Read { key: String, reason: String },

    #[error("failed to write key '{key}': {reason}")]
    Write { key: String, reason: String },

    #[error("failed to remove key '{key}': {reason}")]
    Remove { key: String, reason: String },
}

/// Failures while saving, loading or importing a snapshot.
#[derive(Error, Debug)]
pub enum SaveError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("save data is corrupt: {0}")]
    Corrupt(String),

    #[error("unsupported save version '{0}'")]
    UnsupportedVersion(String),
}

pub type SaveResult<T> = Result<T, SaveError>;
