//! Deterministic simulation harness for Rideflow flows.
//!
//! [`SimEnv`] runs flows on a paused Tokio clock with seeded randomness, so a
//! test drives virtual time and observes the same interleaving on every run.
//! Scripted collaborators record calls and fail on demand, [`Chaotic`] fails
//! at random, and [`RecordingListener`] captures every notification a flow
//! sends to its parent.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks recorded [`FlowTrace`]s against behavioral
//! properties. Use [`InvariantRegistry::standard()`] for the flow invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chaos;
pub mod collaborators;
pub mod invariants;
pub mod listener;
pub mod sim_env;

pub use chaos::Chaotic;
pub use collaborators::{
    ScriptedGeocoder, ScriptedTrips, ScriptedVehicle, TripCall, VehicleCall, transport_error,
};
pub use invariants::{
    ConfirmedIsTerminal, FlowTrace, Invariant, InvariantRegistry, InvariantResult,
    NavigationReentryGuarded, PairReportedOnce, PreTripEdgesValid, SingleTripCreation, Violation,
};
pub use listener::{
    ListenerEvent, RecordingListener, driving_listener, location_listener, on_trip_listener,
    pre_trip_listener,
};
pub use sim_env::{SETTLE, SimEnv};
