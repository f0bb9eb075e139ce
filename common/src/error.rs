//! Error types

use thiserror::Error;

/// Errors raised while building photo records from metadata
#[derive(Error, Debug)]
pub enum Error {
    #[error("metadata key missing: {0}")]
    MissingKey(String),

    #[error("invalid capture time: {0}")]
    InvalidTimestamp(String),

    #[error("capture attribute set is empty")]
    NoCaptureKeys,
}

/// Result alias
pub type Result<T> = std::result::Result<T, Error>;
