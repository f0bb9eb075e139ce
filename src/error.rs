use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PanoError {
    #[error("config error: {0}")]
    Config(String),

    #[error("directory not found: {0}")]
    NotADirectory(PathBuf),

    #[error("duplicate photo name found during scan: {0}")]
    DuplicateIdentity(String),

    #[error("unknown photo: {0}")]
    UnknownIdentity(String),

    #[error("cannot link {from} to {to}: {reason}")]
    InvalidLink {
        from: String,
        to: String,
        reason: &'static str,
    },

    #[error("metadata unavailable for {path}: {reason}")]
    MetadataUnavailable { path: PathBuf, reason: String },

    #[error("conversion failed: {0}")]
    ConversionFailed(PathBuf),

    #[error("panorama not created: {0}")]
    StitchFailed(PathBuf),

    #[error("darktable style not found: {0}")]
    InvalidStyle(String),

    #[error("unknown projection: {0}")]
    InvalidProjection(String),

    #[error("invalid photo table {path}: {reason}")]
    InvalidTable { path: PathBuf, reason: String },

    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("job queue is closed")]
    QueueClosed,

    #[error("worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PanoError {
    pub(crate) fn metadata(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::MetadataUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_table(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::InvalidTable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PanoError>;
