//! Error types for the staging engine

use thiserror::Error;

/// Reasons an entry or submission is refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StagingError {
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },

    #[error("{field} cannot be negative")]
    Negative { field: &'static str },

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("{field} is too large")]
    AmountOutOfRange { field: &'static str },

    #[error("A unit must be selected")]
    MissingUnit,

    #[error("No conversion from '{from}' to '{to}'")]
    NoConversionPath { from: String, to: String },

    #[error("Product has no tare weight configured")]
    TareWeightMissing,

    #[error("Manual entries are not allowed when counting a tare-weighed product absolutely")]
    ManualEntryNotAllowed,

    #[error("Remove staged manual entries before counting a tare-weighed product absolutely")]
    ManualEntriesStaged,

    #[error("Nothing is staged")]
    NothingStaged,
}

/// Failures of the underlying key-value store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage quota exceeded")]
    QuotaExceeded,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A persisted snapshot that cannot be trusted as a whole
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot is missing field '{0}'")]
    MissingField(&'static str),

    #[error("Snapshot field '{0}' has the wrong type")]
    InvalidField(&'static str),
}

/// Result type alias for staging operations
pub type StagingResult<T> = Result<T, StagingError>;
