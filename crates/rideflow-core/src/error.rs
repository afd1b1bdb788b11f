//! Error types for the orchestration core.
//!
//! Two layers with different handling:
//!
//! - [`TransitionError`]: a caller asked a state machine for something its
//!   current state does not allow. Returned to the caller, never fatal.
//! - [`CollaboratorError`] / [`RetryExhausted`]: a network collaborator failed.
//!   Flows absorb these and turn them into a rollback or failed state.

use std::fmt;

use thiserror::Error;

/// Errors returned when a transition cannot be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The operation is not valid from the current state.
    ///
    /// The state cell is untouched and nothing is broadcast.
    #[error("invalid state transition: cannot {operation} from {state}")]
    InvalidStateTransition {
        /// Debug rendering of the state the operation was attempted from
        state: String,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// The state machine was torn down; no further transitions are processed.
    #[error("state machine terminated: cannot {operation}")]
    Terminated {
        /// Operation that was attempted
        operation: &'static str,
    },
}

impl TransitionError {
    /// Build an [`TransitionError::InvalidStateTransition`] for `state`.
    pub fn invalid(state: &impl fmt::Debug, operation: &'static str) -> Self {
        Self::InvalidStateTransition { state: format!("{state:?}"), operation }
    }

    /// Returns true if the caller violated a transition guard.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidStateTransition { .. })
    }
}

/// Failure of a single collaborator call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The request never produced a response (connectivity, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The collaborator answered, but the answer was unusable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The collaborator answered that nothing matched the request.
    #[error("not found: {0}")]
    NotFound(String),
}

impl CollaboratorError {
    /// Returns true if repeating the call may succeed.
    ///
    /// Malformed responses are retried exactly like transport failures. A
    /// definitive "not found" is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::InvalidResponse(_))
    }
}

/// A collaborator call exhausted its retry budget.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed after {attempts} attempt(s): {last_error}")]
pub struct RetryExhausted {
    /// Operation that was retried
    pub operation: &'static str,
    /// Total number of attempts made, including the first
    pub attempts: u32,
    /// Error returned by the final attempt
    pub last_error: CollaboratorError,
}
