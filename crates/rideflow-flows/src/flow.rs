//! Common surface of every flow.

use std::fmt;

use rideflow_core::StateStream;

/// Observable surface shared by all flows.
///
/// Mutators are flow-specific inherent methods; this trait only covers
/// observation and teardown, which coordinators and the simulation harness
/// handle generically.
pub trait Flow {
    /// Closed set of states of this flow.
    type State: Clone + fmt::Debug + Send + 'static;

    /// Subscribe to state changes. Yields the current state first.
    fn observe_state(&self) -> StateStream<Self::State>;

    /// Latest applied state.
    fn current_state(&self) -> Self::State;

    /// Tear the flow down.
    ///
    /// Outstanding collaborator calls are cancelled, every state stream
    /// completes and later mutators fail with
    /// [`rideflow_core::TransitionError::Terminated`]. Already applied
    /// transitions are kept. Also runs on drop.
    fn terminate(&self);
}
