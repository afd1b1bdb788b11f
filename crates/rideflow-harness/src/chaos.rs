//! Chaotic collaborator wrapper for fault injection.
//!
//! Wraps any collaborator and fails calls at random with a configured rate,
//! alternating between transport errors and malformed responses. Chaos tests
//! check that flows always resolve such failures into a defined state.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rideflow_core::{
    CollaboratorError, DriverVehicleInteractor, NamedLocation, StepId, TaskId, TripId,
    TripInteractor, TripRequest, VehicleId, VehicleStatus,
};

/// Seed used by [`Chaotic::new`].
const DEFAULT_SEED: u64 = 0x1234_5678_9ABC_DEF0;

/// Collaborator wrapper that randomly injects failures.
///
/// Clones share the RNG and the counters, so a wrapper handed to a flow and
/// the copy kept by the test observe the same sequence.
#[derive(Clone)]
pub struct Chaotic<C> {
    inner: C,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: Arc<Mutex<ChaCha8Rng>>,
    calls: Arc<AtomicUsize>,
    injected: Arc<AtomicUsize>,
}

impl<C> Chaotic<C> {
    /// Wrap `inner` with the default seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: C, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, DEFAULT_SEED)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: C, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            calls: Arc::new(AtomicUsize::new(0)),
            injected: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wrapped collaborator (for checking what actually got through).
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Calls attempted through the wrapper.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls failed by the wrapper.
    pub fn injected_failures(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    /// Decide the fate of the next call.
    fn roll(&self, operation: &'static str) -> Result<(), CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        if !rng.gen_bool(self.failure_rate) {
            return Ok(());
        }
        let malformed = rng.gen_bool(0.5);
        drop(rng);

        self.injected.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(operation, malformed, "chaotic failure injected");
        Err(if malformed {
            CollaboratorError::InvalidResponse(format!("chaotic {operation} response"))
        } else {
            CollaboratorError::Transport(format!("chaotic {operation} failure"))
        })
    }
}

#[async_trait]
impl<C: TripInteractor> TripInteractor for Chaotic<C> {
    async fn create_trip(&self, request: &TripRequest) -> Result<TripId, CollaboratorError> {
        self.roll("create_trip")?;
        self.inner.create_trip(request).await
    }

    async fn update_pickup(
        &self,
        trip_id: &TripId,
        pickup: &NamedLocation,
    ) -> Result<(), CollaboratorError> {
        self.roll("update_pickup")?;
        self.inner.update_pickup(trip_id, pickup).await
    }

    async fn update_dropoff(
        &self,
        trip_id: &TripId,
        dropoff: &NamedLocation,
    ) -> Result<(), CollaboratorError> {
        self.roll("update_dropoff")?;
        self.inner.update_dropoff(trip_id, dropoff).await
    }
}

#[async_trait]
impl<C: DriverVehicleInteractor> DriverVehicleInteractor for Chaotic<C> {
    async fn complete_step(
        &self,
        vehicle_id: &VehicleId,
        task_id: &TaskId,
        step_id: &StepId,
    ) -> Result<(), CollaboratorError> {
        self.roll("complete_step")?;
        self.inner.complete_step(vehicle_id, task_id, step_id).await
    }

    async fn sync_vehicle_state(
        &self,
        vehicle_id: &VehicleId,
        status: VehicleStatus,
    ) -> Result<(), CollaboratorError> {
        self.roll("sync_vehicle_state")?;
        self.inner.sync_vehicle_state(vehicle_id, status).await
    }
}
