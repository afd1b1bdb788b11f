//! Trip request values.

use serde::{Deserialize, Serialize};

use crate::{location::NamedLocation, plan::string_id};

string_id!(
    /// Identifier assigned to a trip by the trip service.
    TripId
);

/// Vehicle product chosen by the rider while confirming a trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleSelection {
    /// Product identifier understood by the trip service.
    pub product_id: String,
    /// Name shown to the rider.
    pub display_name: String,
}

impl VehicleSelection {
    /// Create a selection.
    pub fn new(product_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self { product_id: product_id.into(), display_name: display_name.into() }
    }
}

/// Everything the trip service needs to create a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRequest {
    /// Where the rider is picked up.
    pub pickup: NamedLocation,
    /// Where the rider is dropped off.
    pub dropoff: NamedLocation,
    /// Seats requested.
    pub seat_count: u32,
    /// Vehicle product requested.
    pub vehicle_selection: VehicleSelection,
}

/// Current pickup and dropoff of a matched trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripLocations {
    /// Current pickup.
    pub pickup: NamedLocation,
    /// Current dropoff.
    pub dropoff: NamedLocation,
}
