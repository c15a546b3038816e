use thiserror::Error;

use super::codec::CodecError;

pub type Result<T> = std::result::Result<T, SchedulerError>;

#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The schedule file could not be read or written.
    #[error("Schedule file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The schedule file exists but is not a valid schedule document.
    #[error("Schedule file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A task argument referenced an entity that no longer exists.
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Unknown priority tag: {0} (expected asap, lazy or timed)")]
    UnknownPriority(String),

    #[error("Timed tasks need a delay in seconds")]
    MissingDelay,

    #[error("Invalid delay: {0}")]
    InvalidDelay(f64),

    /// The worker thread could not be spawned.
    #[error("Failed to spawn scheduler worker: {0}")]
    Spawn(#[source] std::io::Error),
}
