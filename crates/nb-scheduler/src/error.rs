//! Scheduler and dispatcher error types.

use thiserror::Error;

use nb_protocol::{AmbiguityFlag, PolicyError, ReminderId};
use nb_store::StoreError;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("reminder not found: {0}")]
    NotFound(ReminderId),

    /// The parse carried ambiguities and the user has not confirmed it.
    #[error("parse needs confirmation: {0:?}")]
    LowConfidenceParse(Vec<AmbiguityFlag>),

    #[error("snooze duration must be positive")]
    InvalidDuration,

    #[error("reminder {0} kept changing under concurrent updates")]
    Contention(ReminderId),

    #[error("invalid nudge policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for SchedulerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SchedulerError::NotFound(id),
            other => SchedulerError::Store(other),
        }
    }
}

/// Convenience alias for scheduler results.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Payload matched no known command. Nothing was changed.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    /// "Latest" target requested but the owner has no delivered active reminder.
    #[error("no active reminder for {0}")]
    NoActiveReminder(String),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_scheduler_not_found() {
        let id = ReminderId::new();
        let err: SchedulerError = StoreError::NotFound(id).into();
        assert!(matches!(err, SchedulerError::NotFound(found) if found == id));
    }

    #[test]
    fn store_conflict_stays_a_store_error() {
        let id = ReminderId::new();
        let err: SchedulerError = StoreError::Conflict {
            id,
            expected: 1,
            found: 2,
        }
        .into();
        assert!(matches!(err, SchedulerError::Store(e) if e.is_conflict()));
    }
}
