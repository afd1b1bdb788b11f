//! Recorded flow traces for invariant checking.
//!
//! A trace holds every state each observed flow emitted, in order, plus the
//! listener notifications of the run. Invariants check traces rather than
//! live flows so a check sees one consistent picture.

use rideflow_flows::{
    ConfirmationState, DrivingPhase, LocationSelection, OnTripEditState, PreTripState,
};

use crate::listener::ListenerEvent;

/// Everything observable from one simulated run.
#[derive(Debug, Clone, Default)]
pub struct FlowTrace {
    /// States emitted by a location selection flow.
    pub location: Vec<LocationSelection>,
    /// States emitted by a pre-trip flow.
    pub pre_trip: Vec<PreTripState>,
    /// States emitted by an on-trip edit flow.
    pub on_trip: Vec<OnTripEditState>,
    /// States emitted by a driving phase flow.
    pub driving: Vec<DrivingPhase>,
    /// States emitted by a confirmation flow.
    pub confirmation: Vec<ConfirmationState>,
    /// Listener notifications, in order.
    pub events: Vec<ListenerEvent>,
}

impl FlowTrace {
    /// Empty trace.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of listener notifications matching `predicate`.
    pub fn count_events(&self, predicate: impl Fn(&ListenerEvent) -> bool) -> usize {
        self.events.iter().filter(|&event| predicate(event)).count()
    }
}
