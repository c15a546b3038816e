//! Common error types used throughout tvnab.
//!
//! This module provides a unified error type that covers common failure cases
//! reading and writing the JSON data files: I/O and serialization failures.

/// Common error type for tvnab.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON document could not be read or written.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
