//! Error types for the flat tracker.

use crate::types::DestinationId;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for tracker operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Malformed record at {path}: {reason}")]
    MalformedRecord { path: PathBuf, reason: String },

    #[error("Data directory is locked by another process")]
    Locked,

    #[error("Data directory does not exist: {0}")]
    NotInitialized(PathBuf),

    #[error("Unknown env type: {0}")]
    UnknownEnvType(String),

    #[error("Unknown complex: {0}")]
    UnknownComplex(String),

    #[error("Chat {chat_id} is already subscribed to {slug}")]
    AlreadySubscribed { chat_id: DestinationId, slug: String },

    #[error("Chat {chat_id} was not subscribed to {slug}")]
    NotSubscribed { chat_id: DestinationId, slug: String },

    #[error("Got 0 flats from upstream for {0}")]
    EmptySnapshot(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Dispatch to {destination} failed: {reason}")]
    Dispatch {
        destination: DestinationId,
        reason: String,
    },
}

impl From<serde_json::Error> for TrackerError {
    fn from(e: serde_json::Error) -> Self {
        TrackerError::Serialization(e.to_string())
    }
}

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
