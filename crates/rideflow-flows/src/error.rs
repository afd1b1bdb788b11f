//! Errors returned by flow mutators.
//!
//! Collaborator failures triggered by entering a state never show up here:
//! the flow resolves them into a transition. Only synchronous mutator
//! failures reach the caller.

use rideflow_core::{CollaboratorError, RetryExhausted, TransitionError};
use thiserror::Error;

/// Error returned by a flow mutator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// The mutator is not valid from the current state.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// A collaborator call made on behalf of the caller failed outright.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// A collaborator call made on behalf of the caller ran out of retries.
    #[error(transparent)]
    RetryExhausted(#[from] RetryExhausted),

    /// Seat count outside the range this deployment offers.
    #[error("seat count {requested} outside 1..={max}")]
    InvalidSeatCount {
        /// Seats requested
        requested: u32,
        /// Largest seat count offered
        max: u32,
    },
}

impl FlowError {
    /// Returns true if the caller violated a transition guard.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::Transition(err) if err.is_invalid_transition())
    }
}
