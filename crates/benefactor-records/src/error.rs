//! Record Error Types

use thiserror::Error;

use crate::status::RecordStatus;

/// Result type alias
pub type Result<T> = std::result::Result<T, RecordError>;

/// Record and storage errors
#[derive(Error, Debug)]
pub enum RecordError {
    /// No record with the given id
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Status change outside pending → completed/cancelled
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: RecordStatus,
        to: RecordStatus,
    },

    /// Input rejected before anything was persisted
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A record with this id already exists
    #[error("Duplicate record id: {0}")]
    Duplicate(String),

    /// Reading or writing the backing file failed
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    /// Backing file holds something other than a JSON array of records
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
