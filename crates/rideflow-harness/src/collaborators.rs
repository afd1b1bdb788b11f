//! Scripted collaborators.
//!
//! Each collaborator records every call it receives and answers from a
//! failure script: queued errors are returned first, one per call, then calls
//! succeed. An optional latency is slept on the environment clock before
//! answering, which lets tests act while a call is in flight.

#![allow(clippy::disallowed_types, reason = "Call logs are only touched synchronously")]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use rideflow_core::{
    CollaboratorError, Coordinate, DriverVehicleInteractor, Environment, GeocodeInteractor,
    NamedLocation, StepId, TaskId, TripId, TripInteractor, TripRequest, VehicleId, VehicleStatus,
};

/// Error injected by `fail_next`.
pub fn transport_error() -> CollaboratorError {
    CollaboratorError::Transport("injected failure".into())
}

/// Queue of errors returned by the next calls.
#[derive(Debug, Default)]
struct FailureScript {
    queued: VecDeque<CollaboratorError>,
    latency: Duration,
}

impl FailureScript {
    fn next_outcome(&mut self) -> Result<(), CollaboratorError> {
        self.queued.pop_front().map_or(Ok(()), Err)
    }
}

/// Script and call log shared by a collaborator and its clones.
#[derive(Debug)]
struct Recorder<C> {
    script: Mutex<FailureScript>,
    calls: Mutex<Vec<C>>,
}

impl<C: Clone> Recorder<C> {
    fn new() -> Self {
        Self { script: Mutex::new(FailureScript::default()), calls: Mutex::new(Vec::new()) }
    }

    fn script(&self) -> MutexGuard<'_, FailureScript> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn calls(&self) -> Vec<C> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Log `call`, wait out the latency, then answer from the script.
    async fn answer<E: Environment>(&self, env: &E, call: C) -> Result<(), CollaboratorError> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
        let (outcome, latency) = {
            let mut script = self.script();
            (script.next_outcome(), script.latency)
        };
        if !latency.is_zero() {
            env.sleep(latency).await;
        }
        outcome
    }
}

macro_rules! scripting {
    () => {
        /// Fail the next `count` calls with a transport error.
        pub fn fail_next(&self, count: usize) {
            self.fail_next_with(count, transport_error());
        }

        /// Fail the next `count` calls with `error`.
        pub fn fail_next_with(&self, count: usize, error: CollaboratorError) {
            let mut script = self.recorder.script();
            script.queued.extend(std::iter::repeat_n(error, count));
        }

        /// Sleep `latency` on the environment clock before every answer.
        pub fn set_latency(&self, latency: Duration) {
            self.recorder.script().latency = latency;
        }

        /// Number of scripted failures not yet returned.
        pub fn pending_failures(&self) -> usize {
            self.recorder.script().queued.len()
        }
    };
}

/// Call received by [`ScriptedTrips`].
#[derive(Debug, Clone, PartialEq)]
pub enum TripCall {
    /// `create_trip`.
    Create(TripRequest),
    /// `update_pickup`.
    UpdatePickup(TripId, NamedLocation),
    /// `update_dropoff`.
    UpdateDropoff(TripId, NamedLocation),
}

/// Scripted trip service.
///
/// Successful creations return `trip-1`, `trip-2`, ... in order.
#[derive(Clone)]
pub struct ScriptedTrips<E: Environment> {
    env: E,
    recorder: Arc<Recorder<TripCall>>,
    created: Arc<Mutex<u64>>,
}

impl<E: Environment> ScriptedTrips<E> {
    /// Trip service where every call succeeds.
    pub fn new(env: E) -> Self {
        Self { env, recorder: Arc::new(Recorder::new()), created: Arc::new(Mutex::new(0)) }
    }

    scripting!();

    /// Every call received so far.
    pub fn calls(&self) -> Vec<TripCall> {
        self.recorder.calls()
    }

    /// Number of `create_trip` calls received.
    pub fn create_calls(&self) -> usize {
        self.calls().iter().filter(|call| matches!(call, TripCall::Create(_))).count()
    }
}

#[async_trait]
impl<E: Environment> TripInteractor for ScriptedTrips<E> {
    async fn create_trip(&self, request: &TripRequest) -> Result<TripId, CollaboratorError> {
        self.recorder.answer(&self.env, TripCall::Create(request.clone())).await?;
        let mut created = self.created.lock().unwrap_or_else(PoisonError::into_inner);
        *created += 1;
        Ok(TripId::new(format!("trip-{}", *created)))
    }

    async fn update_pickup(
        &self,
        trip_id: &TripId,
        pickup: &NamedLocation,
    ) -> Result<(), CollaboratorError> {
        self.recorder.answer(&self.env, TripCall::UpdatePickup(trip_id.clone(), pickup.clone())).await
    }

    async fn update_dropoff(
        &self,
        trip_id: &TripId,
        dropoff: &NamedLocation,
    ) -> Result<(), CollaboratorError> {
        self.recorder
            .answer(&self.env, TripCall::UpdateDropoff(trip_id.clone(), dropoff.clone()))
            .await
    }
}

/// Call received by [`ScriptedVehicle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VehicleCall {
    /// `complete_step`.
    CompleteStep {
        /// Vehicle the step belongs to.
        vehicle_id: VehicleId,
        /// Task the step belongs to.
        task_id: TaskId,
        /// Step completed.
        step_id: StepId,
    },
    /// `sync_vehicle_state`.
    SyncState(VehicleId, VehicleStatus),
}

/// Scripted driver-vehicle service.
#[derive(Clone)]
pub struct ScriptedVehicle<E: Environment> {
    env: E,
    recorder: Arc<Recorder<VehicleCall>>,
}

impl<E: Environment> ScriptedVehicle<E> {
    /// Vehicle service where every call succeeds.
    pub fn new(env: E) -> Self {
        Self { env, recorder: Arc::new(Recorder::new()) }
    }

    scripting!();

    /// Every call received so far.
    pub fn calls(&self) -> Vec<VehicleCall> {
        self.recorder.calls()
    }

    /// Steps completed, in call order, including failed attempts.
    pub fn completed_steps(&self) -> Vec<StepId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                VehicleCall::CompleteStep { step_id, .. } => Some(step_id),
                VehicleCall::SyncState(..) => None,
            })
            .collect()
    }
}

#[async_trait]
impl<E: Environment> DriverVehicleInteractor for ScriptedVehicle<E> {
    async fn complete_step(
        &self,
        vehicle_id: &VehicleId,
        task_id: &TaskId,
        step_id: &StepId,
    ) -> Result<(), CollaboratorError> {
        let call = VehicleCall::CompleteStep {
            vehicle_id: vehicle_id.clone(),
            task_id: task_id.clone(),
            step_id: step_id.clone(),
        };
        self.recorder.answer(&self.env, call).await
    }

    async fn sync_vehicle_state(
        &self,
        vehicle_id: &VehicleId,
        status: VehicleStatus,
    ) -> Result<(), CollaboratorError> {
        self.recorder.answer(&self.env, VehicleCall::SyncState(vehicle_id.clone(), status)).await
    }
}

/// Scripted geocoder.
///
/// Answers with the configured results, or by default a single location
/// titled after the coordinate.
#[derive(Clone)]
pub struct ScriptedGeocoder<E: Environment> {
    env: E,
    recorder: Arc<Recorder<Coordinate>>,
    results: Arc<Mutex<Option<Vec<NamedLocation>>>>,
}

impl<E: Environment> ScriptedGeocoder<E> {
    /// Geocoder that names every coordinate after itself.
    pub fn new(env: E) -> Self {
        Self { env, recorder: Arc::new(Recorder::new()), results: Arc::new(Mutex::new(None)) }
    }

    scripting!();

    /// Answer every lookup with `results`.
    pub fn set_results(&self, results: Vec<NamedLocation>) {
        *self.results.lock().unwrap_or_else(PoisonError::into_inner) = Some(results);
    }

    /// Coordinates looked up so far.
    pub fn calls(&self) -> Vec<Coordinate> {
        self.recorder.calls()
    }
}

#[async_trait]
impl<E: Environment> GeocodeInteractor for ScriptedGeocoder<E> {
    async fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> Result<Vec<NamedLocation>, CollaboratorError> {
        self.recorder.answer(&self.env, coordinate).await?;
        let results = self.results.lock().unwrap_or_else(PoisonError::into_inner).clone();
        Ok(results.unwrap_or_else(|| vec![NamedLocation::new(coordinate.to_string(), coordinate)]))
    }
}
