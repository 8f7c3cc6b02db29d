use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type KacResult<T> = Result<T, KacError>;

#[derive(Debug, Error)]
pub enum KacError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid class argument {class:?}: {reason}")]
    InvalidClass { class: String, reason: String },

    #[error("cannot load aggregate key {}: {source}", path.display())]
    KeyLoad {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("access denied: {0}")]
    Denied(#[from] Denial),

    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("I/O error on {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KacError {
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }
}

/// Failures talking to the blob store. Terminal for one pipeline run, never retried.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage returned status {status}")]
    Status { status: u16 },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid object name: {0:?}")]
    InvalidName(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

/// Why access was refused. Each reason is reported distinctly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("presence gate rejected principal '{principal}'")]
    Gate { principal: String },

    #[error("presence gate timed out after {0:?}")]
    GateTimeout(Duration),

    #[error("presence gate unavailable: {0}")]
    GateUnavailable(String),

    #[error("class '{class}' is not granted by this device's aggregate key")]
    Class { class: String },
}

/// Which integrity check rejected the recovered data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("authenticated decryption failed: {0}")]
    Decryption(String),

    #[error("plaintext digest does not match header (expected {expected}, got {actual})")]
    HeaderDigest { expected: String, actual: String },

    #[error("plaintext digest does not match sidecar (expected {expected}, got {actual})")]
    SidecarDigest { expected: String, actual: String },
}
