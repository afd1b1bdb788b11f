//! Vehicle plans as reported by the driver-vehicle collaborator.
//!
//! Plans are owned by the collaborator. The core only reads the first
//! waypoint and never mutates a plan.

use serde::{Deserialize, Serialize};

use crate::{location::NamedLocation, trip::TripId};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Create an id from anything string-like.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw id.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

pub(crate) use string_id;

string_id!(
    /// Identifier of a vehicle.
    VehicleId
);
string_id!(
    /// Identifier of a task (one waypoint) in a vehicle plan.
    TaskId
);
string_id!(
    /// Identifier of one step that must be completed to finish a task.
    StepId
);

/// What the driver does at a waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    /// Drive to the rider's pickup location.
    DriveToPickup,
    /// Load the rider into the vehicle.
    LoadResource,
    /// Drive to the rider's dropoff location.
    DriveToDropoff,
}

/// The trip a waypoint belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripResource {
    /// Trip identifier.
    pub trip_id: TripId,
    /// Rider display name. `None` if the rider has not shared one.
    pub rider_name: Option<String>,
    /// Seats booked for this trip.
    pub seat_count: u32,
}

/// Action attached to a waypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointAction {
    /// Where the action happens.
    pub destination: NamedLocation,
    /// What happens there.
    pub action_type: ActionType,
    /// Trip served by this action.
    pub resource: TripResource,
}

/// One stop in a vehicle plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Task this waypoint completes.
    pub task_id: TaskId,
    /// Steps to complete, in order.
    pub step_ids: Vec<StepId>,
    /// Action at this stop.
    pub action: WaypointAction,
}

/// Ordered plan of waypoints for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehiclePlan {
    /// Vehicle the plan belongs to.
    pub vehicle_id: VehicleId,
    /// Remaining stops, next stop first.
    pub waypoints: Vec<Waypoint>,
}

impl VehiclePlan {
    /// Next stop. `None` if the plan is empty.
    pub fn first_waypoint(&self) -> Option<&Waypoint> {
        self.waypoints.first()
    }
}

/// Availability reported for a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleStatus {
    /// Accepting trips.
    Online,
    /// Not accepting trips.
    Offline,
}
