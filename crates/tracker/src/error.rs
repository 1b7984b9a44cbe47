//! Tracker failures with an explicit kind.
//!
//! Every call returns `Ok(..)` for real data, including legitimately empty
//! data, and `Err(TrackerError)` when the fetch itself failed. Callers that
//! prefer the old "empty means nothing" behavior opt in with
//! [`OrEmpty::or_empty`].

use sprintmind_common::SprintMindError;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("{operation}: transport error: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    #[error("{operation}: HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("{operation}: not found: {resource}")]
    NotFound {
        operation: &'static str,
        resource: String,
    },

    #[error("{operation}: unexpected response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
}

/// Coarse classification of a [`TrackerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerErrorKind {
    Transport,
    Status,
    NotFound,
    Decode,
}

impl TrackerError {
    pub fn kind(&self) -> TrackerErrorKind {
        match self {
            TrackerError::Transport { .. } => TrackerErrorKind::Transport,
            TrackerError::Status { .. } => TrackerErrorKind::Status,
            TrackerError::NotFound { .. } => TrackerErrorKind::NotFound,
            TrackerError::Decode { .. } => TrackerErrorKind::Decode,
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            TrackerError::Transport { operation, .. }
            | TrackerError::Status { operation, .. }
            | TrackerError::NotFound { operation, .. }
            | TrackerError::Decode { operation, .. } => operation,
        }
    }
}

impl From<TrackerError> for SprintMindError {
    fn from(err: TrackerError) -> Self {
        SprintMindError::Tracker(err.to_string())
    }
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;

/// Degrade a failed tracker call to its empty value.
pub trait OrEmpty<T> {
    fn or_empty(self) -> T;
}

impl<T: Default> OrEmpty<T> for TrackerResult<T> {
    fn or_empty(self) -> T {
        match self {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    operation = e.operation(),
                    kind = ?e.kind(),
                    error = %e,
                    "Tracker call failed, using empty result"
                );
                T::default()
            }
        }
    }
}
