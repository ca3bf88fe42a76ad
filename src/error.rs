use thiserror::Error;

/// Failures of the key-value store backing session state
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode value for {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode value stored under {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures while loading a training plan file
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("could not read plan file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse plan: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("server rejected plan request ({status}): {message}")]
    Rejected { status: String, message: String },
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
