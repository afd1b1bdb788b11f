//! Trip orchestration flows for Rideflow clients.
//!
//! Each flow owns one [`rideflow_core::StateMachine`], validates every
//! mutator against its current state, triggers collaborator calls when it
//! enters certain states, and turns their outcomes back into transitions.
//! Coordinators render from [`Flow::observe_state`] and receive completion
//! events through non-owning listener references.
//!
//! # Components
//!
//! - [`LocationSelectionFlow`]: pickup/dropoff search, confirmation and map
//!   selection
//! - [`PreTripFlow`]: trip request lifecycle with creation retry and rollback
//! - [`OnTripEditFlow`]: pickup/dropoff edits on a matched trip
//! - [`DrivingPhaseFlow`]: driver navigation toward one waypoint
//! - [`ConfirmationFlow`]: arrival and pickup confirmation
//! - [`DriverTask`]: routing from a vehicle plan to the flow that handles it

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod confirmation;
mod driver_task;
mod driving_phase;
mod error;
mod flow;
mod listener;
mod location_selection;
mod on_trip_edit;
mod pre_trip;
mod system_env;

pub use config::{
    ConfirmationConfig, DEFAULT_CONFIRMATION_RETRY_DELAY, DEFAULT_EDIT_RETRIES,
    DEFAULT_MAX_SEAT_COUNT, DEFAULT_SEAT_COUNT, DEFAULT_TRIP_CREATION_RETRIES,
    DEFAULT_VEHICLE_SYNC_RETRIES, DrivingPhaseConfig, LocationSelectionConfig, OnTripEditConfig,
    PreTripConfig,
};
pub use confirmation::{ConfirmationFlow, ConfirmationKind, ConfirmationState};
pub use driver_task::DriverTask;
pub use driving_phase::{DrivingPhase, DrivingPhaseFlow};
pub use error::FlowError;
pub use flow::Flow;
pub use listener::{
    DrivingListener, LocationSelectionListener, OnTripListener, PreTripListener,
};
pub use location_selection::{
    LocationSelection, LocationSelectionFlow, LocationSelectionStep, LocationState, MapTarget,
    PendingConfirmation,
};
pub use on_trip_edit::{OnTripEditFlow, OnTripEditState};
pub use pre_trip::{PreTripFlow, PreTripState};
pub use system_env::SystemEnv;
