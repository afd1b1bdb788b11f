//! Trip request lifecycle against a scripted trip service.

use std::{sync::Arc, time::Duration};

use rideflow_core::{
    Coordinate, NamedLocation, RetryBudget, TransitionError, TripId, VehicleSelection,
};
use rideflow_flows::{Flow, FlowError, PreTripConfig, PreTripFlow, PreTripState};
use rideflow_harness::{
    ListenerEvent, RecordingListener, ScriptedTrips, SimEnv, TripCall, pre_trip_listener,
};

struct Rig {
    env: SimEnv,
    trips: ScriptedTrips<SimEnv>,
    listener: Arc<RecordingListener>,
    flow: PreTripFlow<SimEnv>,
}

fn rig(config: PreTripConfig) -> Rig {
    let env = SimEnv::with_seed(42);
    let trips = ScriptedTrips::new(env.clone());
    let listener = RecordingListener::new();
    let flow = PreTripFlow::new(
        env.clone(),
        config,
        Arc::new(trips.clone()),
        pre_trip_listener(&listener),
    );
    Rig { env, trips, listener, flow }
}

fn with_seats() -> PreTripConfig {
    PreTripConfig { seat_selection_enabled: true, ..PreTripConfig::default() }
}

fn home() -> NamedLocation {
    NamedLocation::new("Home", Coordinate::new(52.5200, 13.4050))
}

fn office() -> NamedLocation {
    NamedLocation::new("Office", Coordinate::new(52.5163, 13.3777))
}

fn pool() -> VehicleSelection {
    VehicleSelection::new("pool", "Pool")
}

fn confirming_trip() -> PreTripState {
    PreTripState::ConfirmingTrip { pickup: home(), dropoff: office() }
}

#[test]
fn observing_after_construction_yields_initial_state() {
    let rig = rig(PreTripConfig::default());

    let mut states = rig.flow.observe_state();

    assert_eq!(states.drain(), vec![PreTripState::selecting()]);
}

#[tokio::test(start_paused = true)]
async fn confirm_trip_without_seat_selection_creates_trip() {
    let rig = rig(PreTripConfig::default());
    let mut states = rig.flow.observe_state();

    rig.flow.set(home(), office()).unwrap();
    let confirmed = rig.flow.confirm_trip(pool()).unwrap();
    rig.env.settle().await;

    assert_eq!(
        confirmed,
        PreTripState::Confirmed {
            pickup: home(),
            dropoff: office(),
            seat_count: 1,
            vehicle_selection: pool(),
        }
    );
    assert_eq!(rig.listener.created_trips(), vec![TripId::new("trip-1")]);
    assert_eq!(rig.flow.current_state(), confirmed);
    assert_eq!(states.drain(), vec![PreTripState::selecting(), confirming_trip(), confirmed]);
}

#[tokio::test(start_paused = true)]
async fn failures_within_budget_still_create_exactly_one_trip() {
    let rig = rig(PreTripConfig::default());
    rig.trips.fail_next(3);

    rig.flow.set(home(), office()).unwrap();
    rig.flow.confirm_trip(pool()).unwrap();
    rig.env.settle().await;

    assert_eq!(rig.trips.create_calls(), 4);
    assert_eq!(rig.listener.created_trips(), vec![TripId::new("trip-1")]);
    assert!(matches!(rig.flow.current_state(), PreTripState::Confirmed { .. }));
}

#[tokio::test(start_paused = true)]
async fn budget_plus_one_failures_roll_back_one_step() {
    let rig = rig(PreTripConfig::default());
    rig.trips.fail_next(4);
    let mut states = rig.flow.observe_state();

    rig.flow.set(home(), office()).unwrap();
    rig.flow.confirm_trip(pool()).unwrap();
    rig.env.settle().await;

    assert_eq!(rig.trips.create_calls(), 4);
    assert!(rig.listener.events().is_empty());
    assert_eq!(rig.flow.current_state(), confirming_trip());
    let trace = states.drain();
    assert_eq!(trace.len(), 4);
    assert_eq!(trace.last(), Some(&confirming_trip()));
}

#[tokio::test(start_paused = true)]
async fn configured_budget_is_honored() {
    let config = PreTripConfig { creation_retry: RetryBudget::immediate(1), ..PreTripConfig::default() };
    let rig = rig(config);
    rig.trips.fail_next(2);

    rig.flow.set(home(), office()).unwrap();
    rig.flow.confirm_trip(pool()).unwrap();
    rig.env.settle().await;

    assert_eq!(rig.trips.create_calls(), 2);
    assert_eq!(rig.flow.current_state(), confirming_trip());
}

#[tokio::test(start_paused = true)]
async fn retry_after_rollback_creates_trip() {
    let rig = rig(PreTripConfig::default());
    rig.trips.fail_next(4);

    rig.flow.set(home(), office()).unwrap();
    rig.flow.confirm_trip(pool()).unwrap();
    rig.env.settle().await;
    rig.flow.confirm_trip(pool()).unwrap();
    rig.env.settle().await;

    assert_eq!(rig.trips.create_calls(), 5);
    assert_eq!(rig.listener.created_trips(), vec![TripId::new("trip-1")]);
}

#[tokio::test(start_paused = true)]
async fn seat_selection_sends_requested_seats() {
    let rig = rig(with_seats());

    rig.flow.set(home(), office()).unwrap();
    let seats = rig.flow.confirm_trip(pool()).unwrap();
    rig.flow.confirm(2).unwrap();
    rig.env.settle().await;

    assert_eq!(
        seats,
        PreTripState::ConfirmingSeats { pickup: home(), dropoff: office(), vehicle_selection: pool() }
    );
    let Some(TripCall::Create(request)) = rig.trips.calls().into_iter().next() else {
        panic!("expected a create_trip call");
    };
    assert_eq!(request.seat_count, 2);
    assert_eq!(rig.listener.created_trips().len(), 1);
}

#[test]
fn seat_count_outside_range_is_rejected_without_emission() {
    let rig = rig(with_seats());
    rig.flow.set(home(), office()).unwrap();
    rig.flow.confirm_trip(pool()).unwrap();
    let mut states = rig.flow.observe_state();

    assert_eq!(rig.flow.confirm(0), Err(FlowError::InvalidSeatCount { requested: 0, max: 2 }));
    assert_eq!(rig.flow.confirm(3), Err(FlowError::InvalidSeatCount { requested: 3, max: 2 }));
    assert_eq!(states.drain().len(), 1);
}

#[test]
fn confirm_outside_seat_selection_is_an_invalid_transition_whatever_the_count() {
    let rig = rig(with_seats());
    let mut states = rig.flow.observe_state();

    let from_selecting = [rig.flow.confirm(0).unwrap_err(), rig.flow.confirm(3).unwrap_err()];
    rig.flow.set(home(), office()).unwrap();
    let from_review = [rig.flow.confirm(0).unwrap_err(), rig.flow.confirm(1).unwrap_err()];

    assert!(from_selecting.iter().all(FlowError::is_invalid_transition));
    assert!(from_review.iter().all(FlowError::is_invalid_transition));
    assert_eq!(states.drain(), vec![PreTripState::selecting(), confirming_trip()]);
}

#[test]
fn cancel_seat_selection_returns_to_trip_review() {
    let rig = rig(with_seats());
    rig.flow.set(home(), office()).unwrap();
    rig.flow.confirm_trip(pool()).unwrap();

    let back = rig.flow.cancel_seat_selection().unwrap();

    assert_eq!(back, confirming_trip());
    assert!(rig.flow.cancel_seat_selection().unwrap_err().is_invalid_transition());
}

#[test]
fn cancel_confirm_trip_reseeds_confirmed_locations() {
    let rig = rig(PreTripConfig::default());
    rig.flow.set(home(), office()).unwrap();

    let back = rig.flow.cancel_confirm_trip().unwrap();

    let seed = back.location_state().unwrap();
    assert!(seed.pickup.is_some_and(|pickup| pickup.was_confirmed && pickup.location == home()));
    assert!(seed.dropoff.is_some_and(|dropoff| dropoff.was_confirmed && dropoff.location == office()));
    assert!(!seed.changed_by_user);
}

#[test]
fn invalid_mutators_emit_nothing() {
    let rig = rig(PreTripConfig::default());
    let mut states = rig.flow.observe_state();

    let errors = [
        rig.flow.confirm_trip(pool()).unwrap_err(),
        rig.flow.cancel_confirm_trip().unwrap_err(),
        rig.flow.cancel_seat_selection().unwrap_err(),
    ];
    rig.flow.set(home(), office()).unwrap();
    let repeated = rig.flow.set(home(), office()).unwrap_err();

    assert!(errors.iter().all(FlowError::is_invalid_transition));
    insta::assert_snapshot!(
        repeated,
        @r#"invalid state transition: cannot set from ConfirmingTrip { pickup: NamedLocation { title: "Home", subtitle: None, coordinate: Coordinate { latitude: 52.52, longitude: 13.405 } }, dropoff: NamedLocation { title: "Office", subtitle: None, coordinate: Coordinate { latitude: 52.5163, longitude: 13.3777 } } }"#
    );
    assert_eq!(states.drain(), vec![PreTripState::selecting(), confirming_trip()]);
}

#[test]
fn cancellations_are_delegated_to_the_listener() {
    let rig = rig(PreTripConfig::default());
    let mut states = rig.flow.observe_state();

    rig.flow.cancel_trip_request();
    rig.flow.cancel_set_pickup_dropoff();

    assert_eq!(rig.listener.events(), vec![ListenerEvent::CancelPreTrip, ListenerEvent::CancelPreTrip]);
    assert_eq!(states.drain().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn terminate_cancels_creation_in_flight() {
    let rig = rig(PreTripConfig::default());
    rig.trips.set_latency(Duration::from_millis(500));
    let mut states = rig.flow.observe_state();

    rig.flow.set(home(), office()).unwrap();
    rig.flow.confirm_trip(pool()).unwrap();
    rig.env.settle().await;
    rig.flow.terminate();
    rig.env.advance(Duration::from_secs(5)).await;

    assert_eq!(rig.trips.create_calls(), 1);
    assert!(rig.listener.events().is_empty());
    assert_eq!(states.drain().len(), 3);
    assert_eq!(states.next_state().await, None);
    assert_eq!(
        rig.flow.cancel_confirm_trip(),
        Err(FlowError::Transition(TransitionError::Terminated { operation: "cancel_confirm_trip" }))
    );
}

#[tokio::test(start_paused = true)]
async fn dropped_listener_turns_creation_into_no_op() {
    let Rig { env, trips, listener, flow } = rig(PreTripConfig::default());
    drop(listener);

    flow.set(home(), office()).unwrap();
    flow.confirm_trip(pool()).unwrap();
    env.settle().await;

    assert_eq!(trips.create_calls(), 1);
    assert!(matches!(flow.current_state(), PreTripState::Confirmed { .. }));
}
