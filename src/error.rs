//! Error taxonomy shared by the trainer, the prediction service and the history store.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ChurnError {
    /// Training dataset missing or unreadable.
    #[error("dataset not found at {}: {source}", path.display())]
    DatasetNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input could not be read as a table, or a training cell is not numeric.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A persisted scaler or classifier is missing or fails validation.
    #[error("failed to load artifact {}: {reason}", path.display())]
    ArtifactLoad { path: PathBuf, reason: String },

    /// Only raised under `CoercionPolicy::Reject`.
    #[error("invalid value for feature `{field}`: {value:?}")]
    InvalidFeature { field: &'static str, value: String },

    #[error("training failed: {0}")]
    Training(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for ChurnError {
    fn from(e: rusqlite::Error) -> Self {
        ChurnError::Storage(e.to_string())
    }
}

impl From<csv::Error> for ChurnError {
    fn from(e: csv::Error) -> Self {
        ChurnError::MalformedInput(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChurnError>;
