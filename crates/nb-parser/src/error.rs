//! Parser error types.

use thiserror::Error;

/// Errors from resolving a temporal expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no temporal expression recognized")]
    UnparseableTime,

    #[error("invalid date: {0}")]
    InvalidDate(String),
}

/// Why a message could not be turned into a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    NoTimeFound,
    InvalidDate,
}

/// A failed parse. The caller re-prompts the user; nothing is created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not parse reminder: {reason:?}")]
pub struct ParseFailure {
    pub reason: FailureReason,
    /// Reserved for a rephrasing hint; never filled by the rule-based parser.
    pub suggestion: Option<String>,
}

impl ParseFailure {
    pub fn new(reason: FailureReason) -> Self {
        Self {
            reason,
            suggestion: None,
        }
    }
}

impl From<ResolveError> for ParseFailure {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::UnparseableTime => Self::new(FailureReason::NoTimeFound),
            ResolveError::InvalidDate(_) => Self::new(FailureReason::InvalidDate),
        }
    }
}

pub type ResolveResult<T> = Result<T, ResolveError>;
