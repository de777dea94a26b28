//! Delivery error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// Transient; the scheduler retries the same attempt.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("delivery timed out after {0} ms")]
    Timeout(u64),
}

/// Convenience alias for delivery results.
pub type NotifyResult<T> = Result<T, NotifyError>;
