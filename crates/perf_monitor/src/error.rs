//! Error types for the performance monitor.
//!
//! These only surface at internal seams (store insertion, settings IO,
//! long-task subscription). The measurement API itself never fails.

use thiserror::Error;

use crate::record::RecordId;

/// Errors that can occur inside the performance monitor.
#[derive(Debug, Error)]
pub enum PerfError {
    /// Reading or writing a settings file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or parse settings
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record with this id is already stored
    #[error("Duplicate record id: {0}")]
    DuplicateRecord(RecordId),

    /// The external long-task facility cannot be observed
    #[error("Long-task source unavailable: {0}")]
    SourceUnavailable(String),
}

/// Result type for monitor operations.
pub type PerfResult<T> = Result<T, PerfError>;
