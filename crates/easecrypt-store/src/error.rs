//! Error types for on-ramp storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// A conditional write lost a race.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A unique key (id or payment reference) is already taken.
    #[error("duplicate: {0}")]
    Duplicate(String),
}
