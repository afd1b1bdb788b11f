//! Network collaborators consumed by the flows.
//!
//! Each operation is a single fallible asynchronous call. The flows treat the
//! implementations as opaque: they only see a success value or a
//! [`CollaboratorError`], and wrap every call in a retry budget.

use async_trait::async_trait;

use crate::{
    error::CollaboratorError,
    location::{Coordinate, NamedLocation},
    plan::{StepId, TaskId, VehicleId, VehicleStatus},
    trip::{TripId, TripRequest},
};

/// Trip service used by rider flows.
#[async_trait]
pub trait TripInteractor: Send + Sync {
    /// Create a trip and return its identifier.
    async fn create_trip(&self, request: &TripRequest) -> Result<TripId, CollaboratorError>;

    /// Move the pickup of a matched trip.
    async fn update_pickup(
        &self,
        trip_id: &TripId,
        pickup: &NamedLocation,
    ) -> Result<(), CollaboratorError>;

    /// Move the dropoff of a matched trip.
    async fn update_dropoff(
        &self,
        trip_id: &TripId,
        dropoff: &NamedLocation,
    ) -> Result<(), CollaboratorError>;
}

/// Vehicle service used by driver flows.
#[async_trait]
pub trait DriverVehicleInteractor: Send + Sync {
    /// Mark one step of a task as completed.
    ///
    /// Completing an already completed step succeeds.
    async fn complete_step(
        &self,
        vehicle_id: &VehicleId,
        task_id: &TaskId,
        step_id: &StepId,
    ) -> Result<(), CollaboratorError>;

    /// Push the vehicle's availability to the service.
    async fn sync_vehicle_state(
        &self,
        vehicle_id: &VehicleId,
        status: VehicleStatus,
    ) -> Result<(), CollaboratorError>;
}

/// Geocoding service used for map-based location selection.
#[async_trait]
pub trait GeocodeInteractor: Send + Sync {
    /// Candidate names for a coordinate, best match first.
    async fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> Result<Vec<NamedLocation>, CollaboratorError>;
}
