//! Store error types.

use nb_protocol::ReminderId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reminder not found: {0}")]
    NotFound(ReminderId),

    /// The stored version moved on since the caller read it.
    #[error("concurrent modification of reminder {id} (expected version {expected}, found {found})")]
    Conflict {
        id: ReminderId,
        expected: u64,
        found: u64,
    },

    #[error("reminder already exists: {0}")]
    Duplicate(ReminderId),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Convenience alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;
