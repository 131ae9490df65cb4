//! Error types for the IndiFS commit engine.

use thiserror::Error;

/// Storage collaborator errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the filesystem, the commit builder and the applier
#[derive(Debug, Error)]
pub enum Error {
    /// Path or offset is not present in the current tree or store.
    #[error("not found")]
    NotFound,

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Directory fan-out exceeded at commit-build time.
    #[error("too many files")]
    TooManyFiles,

    /// Any structural, cryptographic or content violation in a commit.
    #[error("invalid commit: {0}")]
    InvalidCommit(String),

    #[error("invalid merkle proof: {0}")]
    InvalidProof(#[from] crate::crypto::merkle::ProofError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("header serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
