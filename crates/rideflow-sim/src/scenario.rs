//! Scripted rider and driver journeys.
//!
//! Each journey plays the coordinator: it creates flows, forwards listener
//! results between them, and waits on the real clock for background
//! collaborator calls to resolve. Rolled-back requests and failed
//! confirmations are repeated, the way a user would tap again.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use rideflow_core::{
    ActionType, Coordinate, Environment, NamedLocation, RetryBudget, StepId, TaskId, TripId,
    TripLocations, TripResource, VehicleId, VehiclePlan, VehicleSelection, Waypoint,
    WaypointAction,
};
use rideflow_flows::{
    ConfirmationConfig, ConfirmationFlow, ConfirmationState, DriverTask, DrivingPhaseConfig,
    DrivingPhaseFlow, Flow, FlowError, LocationSelectionConfig, LocationSelectionFlow,
    LocationSelectionListener, OnTripEditConfig, OnTripEditFlow, OnTripEditState, PreTripConfig,
    PreTripFlow, PreTripState, SystemEnv,
};
use rideflow_harness::{
    Chaotic, ListenerEvent, RecordingListener, ScriptedGeocoder, ScriptedTrips, ScriptedVehicle,
    TripCall, driving_listener, on_trip_listener, pre_trip_listener,
};
use serde::Serialize;
use thiserror::Error;

/// Interval between checks on background collaborator calls.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Checks before a journey stops waiting.
const MAX_POLLS: u32 = 3_000;

/// Times a rolled-back request or failed confirmation is repeated.
const MAX_ATTEMPTS: u32 = 5;

/// Retries per step before a confirmation attempt fails.
const STEP_RETRIES: u32 = 2;

/// Seats requested when seat selection is enabled.
const REQUESTED_SEATS: u32 = 2;

type Vehicles = Chaotic<ScriptedVehicle<SystemEnv>>;

/// Errors that end a journey early.
#[derive(Debug, Error)]
pub enum SimError {
    /// A flow rejected a scripted action.
    #[error(transparent)]
    Flow(#[from] FlowError),

    /// Failure rate outside `0.0..=1.0`.
    #[error("failure rate {0} outside 0.0..=1.0")]
    InvalidFailureRate(f64),

    /// A background call did not resolve in time.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// Every attempt was rolled back or failed.
    #[error("{0} still failing after {MAX_ATTEMPTS} attempts")]
    GaveUp(&'static str),
}

/// Knobs shared by both journeys.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioConfig {
    /// Probability that a collaborator call fails.
    pub failure_rate: f64,
    /// Seed for injected failures.
    pub seed: u64,
    /// Retries after a failed trip creation.
    pub creation_retries: u32,
    /// Ask for a seat count before creating the trip.
    pub seat_selection: bool,
    /// Latency of every collaborator call.
    pub latency: Duration,
}

/// Outcome of a journey.
#[derive(Debug, Default, Serialize)]
pub struct Report {
    /// Journey that ran.
    pub scenario: &'static str,
    /// Seed for injected failures.
    pub seed: u64,
    /// User actions repeated after a rollback or failed confirmation,
    /// including the first attempt.
    pub attempts: u32,
    /// Calls that reached the chaotic collaborator.
    pub collaborator_calls: usize,
    /// Calls failed on purpose.
    pub injected_failures: usize,
    /// Trip created by the rider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<TripId>,
    /// Final trip request state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<PreTripState>,
    /// Final trip edit state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit: Option<OnTripEditState>,
    /// Tasks the driver finished, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub completed_tasks: Vec<TaskId>,
    /// Listener notifications received.
    pub events: usize,
}

async fn wait_for(
    env: &SystemEnv,
    what: &'static str,
    mut done: impl FnMut() -> bool,
) -> Result<(), SimError> {
    for _ in 0..MAX_POLLS {
        if done() {
            return Ok(());
        }
        env.sleep(POLL_INTERVAL).await;
    }
    Err(SimError::Timeout(what))
}

fn place(title: &str, latitude: f64, longitude: f64) -> NamedLocation {
    NamedLocation::new(title, Coordinate::new(latitude, longitude))
}

/// Request a trip, then move its dropoff once matched.
pub async fn rider(config: &ScenarioConfig) -> Result<Report, SimError> {
    let env = SystemEnv::new();
    let scripted = ScriptedTrips::new(env);
    scripted.set_latency(config.latency);
    let trips = Chaotic::with_seed(scripted, config.failure_rate, config.seed);
    let geocoder = ScriptedGeocoder::new(env);
    geocoder.set_latency(config.latency);
    let rider = RecordingListener::new();

    let request = Arc::new(PreTripFlow::new(
        env,
        PreTripConfig {
            seat_selection_enabled: config.seat_selection,
            creation_retry: RetryBudget::immediate(config.creation_retries),
            ..PreTripConfig::default()
        },
        Arc::new(trips.clone()),
        pre_trip_listener(&rider),
    ));

    let station = place("Central Station", 52.3791, 4.9003);
    let museum = place("Rijksmuseum", 52.3600, 4.8852);
    let pickup_pin = Coordinate::new(52.3784, 4.8995);

    let parent: Weak<dyn LocationSelectionListener> =
        Arc::<PreTripFlow<SystemEnv>>::downgrade(&request);
    let selection = LocationSelectionFlow::new(
        env,
        LocationSelectionConfig::default(),
        request.current_state().location_state().unwrap_or_default(),
        Arc::new(geocoder),
        parent,
    );
    selection.select_search_result(station)?;
    selection.select_search_result(museum.clone())?;
    selection.confirm_dropoff(museum.clone())?;
    selection.set_pickup_on_map()?;
    selection.confirm_map_location(pickup_pin).await?;
    drop(selection);

    let mut attempts = 0;
    loop {
        attempts += 1;
        if attempts > MAX_ATTEMPTS {
            return Err(SimError::GaveUp("trip creation"));
        }

        request.confirm_trip(VehicleSelection::new("standard", "Standard"))?;
        if config.seat_selection {
            request.confirm(REQUESTED_SEATS)?;
        }
        wait_for(&env, "trip creation", || {
            !rider.created_trips().is_empty()
                || matches!(request.current_state(), PreTripState::ConfirmingTrip { .. })
        })
        .await?;

        if !rider.created_trips().is_empty() {
            break;
        }
        tracing::warn!(attempts, "trip request rolled back, confirming again");
    }

    let Some(trip_id) = rider.created_trips().into_iter().next() else {
        return Err(SimError::Timeout("trip creation"));
    };
    let PreTripState::Confirmed { pickup, dropoff, .. } = request.current_state() else {
        return Err(SimError::GaveUp("trip confirmation"));
    };

    let edit = Arc::new(OnTripEditFlow::new(
        env,
        OnTripEditConfig::default(),
        trip_id.clone(),
        Arc::new(trips.clone()),
        on_trip_listener(&rider),
    ));
    let editing = edit.edit_dropoff(TripLocations { pickup, dropoff })?;

    let parent: Weak<dyn LocationSelectionListener> =
        Arc::<OnTripEditFlow<SystemEnv>>::downgrade(&edit);
    let selection = LocationSelectionFlow::new(
        env,
        LocationSelectionConfig::default(),
        editing.location_state().unwrap_or_default(),
        Arc::new(ScriptedGeocoder::new(env)),
        parent,
    );
    let vondelpark = place("Vondelpark", 52.3580, 4.8686);
    selection.select_search_result(vondelpark.clone())?;
    selection.confirm_dropoff(vondelpark)?;

    wait_for(&env, "trip edit", || {
        edit.current_state() == OnTripEditState::CurrentTrip
            || trips
                .inner()
                .calls()
                .iter()
                .any(|call| matches!(call, TripCall::UpdateDropoff(..)))
    })
    .await?;
    if edit.current_state() == OnTripEditState::CurrentTrip {
        tracing::warn!(%trip_id, "dropoff edit rolled back");
    } else {
        // Stand-in for the service that polls for the applied edit.
        env.sleep(config.latency).await;
        edit.edit_confirmed()?;
    }
    edit.trip_finished();

    Ok(Report {
        scenario: "rider",
        seed: config.seed,
        attempts,
        collaborator_calls: trips.call_count(),
        injected_failures: trips.injected_failures(),
        trip_id: Some(trip_id),
        request: Some(request.current_state()),
        edit: Some(edit.current_state()),
        events: rider.events().len(),
        ..Report::default()
    })
}

fn demo_plan() -> VehiclePlan {
    let resource = TripResource {
        trip_id: TripId::new("trip-1"),
        rider_name: Some("Noor".into()),
        seat_count: 1,
    };
    let stop = |task: &str, steps: &[&str], destination: NamedLocation, action_type| Waypoint {
        task_id: TaskId::new(task),
        step_ids: steps.iter().map(|step| StepId::new(*step)).collect(),
        action: WaypointAction { destination, action_type, resource: resource.clone() },
    };

    let station = place("Central Station", 52.3791, 4.9003);
    let museum = place("Rijksmuseum", 52.3600, 4.8852);
    VehiclePlan {
        vehicle_id: VehicleId::new("car-1"),
        waypoints: vec![
            stop("pickup-drive", &["arrived"], station.clone(), ActionType::DriveToPickup),
            stop("pickup-load", &["doors", "seatbelt"], station, ActionType::LoadResource),
            stop("dropoff-drive", &["arrived", "unloaded"], museum, ActionType::DriveToDropoff),
        ],
    }
}

/// Confirm the waypoint of `task`, repeating failed attempts.
///
/// Returns the number of attempts made.
async fn confirm_task(
    env: &SystemEnv,
    task: &DriverTask,
    vehicles: &Vehicles,
) -> Result<u32, SimError> {
    let flow = ConfirmationFlow::new(
        *env,
        ConfirmationConfig { step_retry: RetryBudget::immediate(STEP_RETRIES) },
        task.confirmation_kind(),
        task.vehicle_id().clone(),
        task.waypoint(),
        Arc::new(vehicles.clone()),
    );

    for attempt in 1..=MAX_ATTEMPTS {
        flow.confirm()?;
        wait_for(env, "step completion", || {
            flow.current_state() != ConfirmationState::Confirming
        })
        .await?;

        if flow.current_state() == ConfirmationState::Confirmed {
            return Ok(attempt);
        }
        tracing::warn!(kind = ?flow.kind(), attempt, "confirmation failed, confirming again");
    }
    Err(SimError::GaveUp("confirmation"))
}

/// Work through a pickup and dropoff plan, then go offline.
pub async fn driver(config: &ScenarioConfig) -> Result<Report, SimError> {
    let env = SystemEnv::new();
    let scripted = ScriptedVehicle::new(env);
    scripted.set_latency(config.latency);
    let vehicles = Chaotic::with_seed(scripted, config.failure_rate, config.seed);
    let driver = RecordingListener::new();

    let mut plan = demo_plan();
    let mut completed_tasks = Vec::new();
    let mut attempts = 0;

    while let Some(task) = DriverTask::from_plan(&plan) {
        let task_id = task.waypoint().task_id.clone();
        tracing::info!(%task_id, kind = ?task.confirmation_kind(), "next task");

        match &task {
            DriverTask::Driving { vehicle_id, waypoint } => {
                let driving = DrivingPhaseFlow::new(
                    env,
                    DrivingPhaseConfig::default(),
                    vehicle_id.clone(),
                    waypoint.clone(),
                    Arc::new(vehicles.clone()),
                    driving_listener(&driver),
                );
                driving.start_navigation()?;
                env.sleep(config.latency).await;
                driving.finished_navigation(false)?;
                attempts += confirm_task(&env, &task, &vehicles).await?;
                driving.arrival_confirmed()?;

                if plan.waypoints.len() == 1 {
                    driving.go_offline()?;
                    wait_for(&env, "offline sync", || {
                        driver.count(|event| *event == ListenerEvent::DidGoOffline) > 0
                    })
                    .await?;
                }
            },
            DriverTask::ConfirmingPickup { .. } => {
                attempts += confirm_task(&env, &task, &vehicles).await?;
            },
        }

        completed_tasks.push(task_id);
        plan.waypoints.remove(0);
    }

    Ok(Report {
        scenario: "driver",
        seed: config.seed,
        attempts,
        collaborator_calls: vehicles.call_count(),
        injected_failures: vehicles.injected_failures(),
        completed_tasks,
        events: driver.events().len(),
        ..Report::default()
    })
}
