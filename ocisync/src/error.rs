use ocimodel::DigestError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed manifest ({media_type}): {source}")]
    MalformedManifest {
        media_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Digest error: {0}")]
    Digest(#[from] DigestError),

    #[error("Digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("Missing artifact type")]
    MissingArtifactType,

    #[error("Invalid date and time format: {0}")]
    InvalidDateTimeFormat(String),

    #[error("Operation canceled")]
    Canceled,
}

pub type Result<T> = std::result::Result<T, Error>;
