//! Core primitives for Rideflow trip orchestration.
//!
//! Everything the flows build on, with no knowledge of any particular flow:
//!
//! - [`StateMachine`]: one serialized state cell with replay-latest broadcast
//! - [`Environment`]: injectable clock and task scheduler
//! - [`retry`]: bounded and unbounded retry budgets for collaborator calls
//! - [`TaskSet`]: tracking of in-flight network tasks for teardown
//! - Domain values ([`location`], [`plan`], [`trip`]) and the collaborator
//!   traits the flows call into ([`collaborator`])

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod collaborator;
pub mod env;
pub mod error;
pub mod location;
pub mod machine;
pub mod plan;
pub mod retry;
pub mod tasks;
pub mod trip;

pub use collaborator::{DriverVehicleInteractor, GeocodeInteractor, TripInteractor};
pub use env::Environment;
pub use error::{CollaboratorError, RetryExhausted, TransitionError};
pub use location::{Coordinate, LocationFocus, NamedLocation, PreTripLocation};
pub use machine::{StateMachine, StateStream};
pub use plan::{ActionType, StepId, TaskId, TripResource, VehicleId, VehiclePlan, VehicleStatus, Waypoint, WaypointAction};
pub use retry::{RetryBudget, RetryStrategy, retry};
pub use tasks::TaskSet;
pub use trip::{TripId, TripLocations, TripRequest, VehicleSelection};
