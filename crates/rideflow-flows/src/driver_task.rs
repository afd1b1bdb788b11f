//! Routing from a vehicle plan to the driver screen that handles it.

use rideflow_core::{ActionType, VehicleId, VehiclePlan, Waypoint};

use crate::confirmation::ConfirmationKind;

/// What the driver does next, derived from the first waypoint of a plan.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverTask {
    /// Drive to the waypoint, then confirm arrival.
    Driving {
        /// Vehicle being driven.
        vehicle_id: VehicleId,
        /// Next stop.
        waypoint: Waypoint,
    },
    /// Confirm that the rider got in.
    ConfirmingPickup {
        /// Vehicle being loaded.
        vehicle_id: VehicleId,
        /// Next stop.
        waypoint: Waypoint,
    },
}

impl DriverTask {
    /// Task for the first waypoint of `plan`. `None` for an empty plan.
    pub fn from_plan(plan: &VehiclePlan) -> Option<Self> {
        let waypoint = plan.first_waypoint()?.clone();
        let vehicle_id = plan.vehicle_id.clone();

        Some(match waypoint.action.action_type {
            ActionType::DriveToPickup | ActionType::DriveToDropoff => {
                Self::Driving { vehicle_id, waypoint }
            },
            ActionType::LoadResource => Self::ConfirmingPickup { vehicle_id, waypoint },
        })
    }

    /// Waypoint the task works on.
    pub fn waypoint(&self) -> &Waypoint {
        match self {
            Self::Driving { waypoint, .. } | Self::ConfirmingPickup { waypoint, .. } => waypoint,
        }
    }

    /// Vehicle the task belongs to.
    pub fn vehicle_id(&self) -> &VehicleId {
        match self {
            Self::Driving { vehicle_id, .. } | Self::ConfirmingPickup { vehicle_id, .. } => {
                vehicle_id
            },
        }
    }

    /// Kind of confirmation that ends this task.
    pub fn confirmation_kind(&self) -> ConfirmationKind {
        match self {
            Self::Driving { .. } => ConfirmationKind::Arrival,
            Self::ConfirmingPickup { .. } => ConfirmationKind::Pickup,
        }
    }
}
