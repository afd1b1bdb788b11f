//! Pickup/dropoff edits on a matched trip.

use std::{sync::Arc, time::Duration};

use rideflow_core::{Coordinate, NamedLocation, TripId, TripLocations};
use rideflow_flows::{Flow, OnTripEditConfig, OnTripEditFlow, OnTripEditState};
use rideflow_harness::{
    ListenerEvent, RecordingListener, ScriptedTrips, SimEnv, TripCall, on_trip_listener,
};

struct Rig {
    env: SimEnv,
    trips: ScriptedTrips<SimEnv>,
    listener: Arc<RecordingListener>,
    flow: OnTripEditFlow<SimEnv>,
}

fn rig() -> Rig {
    let env = SimEnv::with_seed(11);
    let trips = ScriptedTrips::new(env.clone());
    let listener = RecordingListener::new();
    let flow = OnTripEditFlow::new(
        env.clone(),
        OnTripEditConfig::default(),
        TripId::new("trip-9"),
        Arc::new(trips.clone()),
        on_trip_listener(&listener),
    );
    Rig { env, trips, listener, flow }
}

fn station() -> NamedLocation {
    NamedLocation::new("Station", Coordinate::new(51.5308, -0.1238))
}

fn museum() -> NamedLocation {
    NamedLocation::new("Museum", Coordinate::new(51.4967, -0.1764))
}

fn bridge() -> NamedLocation {
    NamedLocation::new("Bridge", Coordinate::new(51.5055, -0.0754))
}

fn existing() -> TripLocations {
    TripLocations { pickup: station(), dropoff: museum() }
}

#[tokio::test(start_paused = true)]
async fn successful_pickup_update_waits_for_confirmation() {
    let rig = rig();
    let mut states = rig.flow.observe_state();

    let editing = rig.flow.edit_pickup(existing()).unwrap();
    let updating = rig.flow.set(bridge(), museum()).unwrap();
    rig.env.settle().await;

    assert_eq!(
        editing,
        OnTripEditState::EditingPickup { existing_pickup: station(), existing_dropoff: museum() }
    );
    assert_eq!(updating, OnTripEditState::UpdatingPickup { new_pickup: bridge() });
    assert_eq!(rig.trips.calls(), vec![TripCall::UpdatePickup(TripId::new("trip-9"), bridge())]);
    assert_eq!(rig.flow.current_state(), updating);
    assert_eq!(states.drain().len(), 3);
    assert!(rig.listener.events().is_empty());

    assert_eq!(rig.flow.edit_confirmed().unwrap(), OnTripEditState::CurrentTrip);
}

#[tokio::test(start_paused = true)]
async fn dropoff_edit_sends_only_the_dropoff() {
    let rig = rig();

    rig.flow.edit_dropoff(existing()).unwrap();
    let updating = rig.flow.set(station(), bridge()).unwrap();
    rig.env.settle().await;

    assert_eq!(updating, OnTripEditState::UpdatingDropoff { new_dropoff: bridge() });
    assert_eq!(rig.trips.calls(), vec![TripCall::UpdateDropoff(TripId::new("trip-9"), bridge())]);
}

#[tokio::test(start_paused = true)]
async fn failures_within_budget_keep_updating() {
    let rig = rig();
    rig.trips.fail_next(5);

    rig.flow.edit_pickup(existing()).unwrap();
    rig.flow.set(bridge(), museum()).unwrap();
    rig.env.settle().await;

    assert_eq!(rig.trips.calls().len(), 6);
    assert_eq!(rig.flow.current_state(), OnTripEditState::UpdatingPickup { new_pickup: bridge() });
}

#[tokio::test(start_paused = true)]
async fn exhausted_update_rolls_back_to_current_trip() {
    let rig = rig();
    rig.trips.fail_next(6);
    let mut states = rig.flow.observe_state();

    rig.flow.edit_dropoff(existing()).unwrap();
    rig.flow.set(station(), bridge()).unwrap();
    rig.env.settle().await;

    assert_eq!(rig.trips.calls().len(), 6);
    assert_eq!(rig.flow.current_state(), OnTripEditState::CurrentTrip);
    let trace = states.drain();
    assert_eq!(trace.first(), Some(&OnTripEditState::CurrentTrip));
    assert_eq!(trace.last(), Some(&OnTripEditState::CurrentTrip));
    assert_eq!(trace.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn stale_rollback_does_not_clobber_a_newer_edit() {
    let rig = rig();
    rig.trips.set_latency(Duration::from_millis(100));
    rig.trips.fail_next(6);

    rig.flow.edit_pickup(existing()).unwrap();
    rig.flow.set(bridge(), museum()).unwrap();
    rig.env.settle().await;
    rig.flow.edit_confirmed().unwrap();
    let editing = rig.flow.edit_dropoff(existing()).unwrap();
    rig.env.advance(Duration::from_secs(2)).await;

    assert_eq!(rig.trips.pending_failures(), 0);
    assert_eq!(rig.flow.current_state(), editing);
}

#[test]
fn edits_are_guarded_by_state() {
    let rig = rig();

    assert!(rig.flow.set(bridge(), museum()).unwrap_err().is_invalid_transition());
    assert!(rig.flow.edit_confirmed().unwrap_err().is_invalid_transition());
    assert!(rig.flow.cancel_set_pickup_dropoff().unwrap_err().is_invalid_transition());

    rig.flow.edit_pickup(existing()).unwrap();

    assert!(rig.flow.edit_dropoff(existing()).unwrap_err().is_invalid_transition());
    assert!(rig.flow.edit_confirmed().unwrap_err().is_invalid_transition());
}

#[test]
fn cancelling_an_edit_returns_to_current_trip() {
    let rig = rig();
    rig.flow.edit_dropoff(existing()).unwrap();

    let back = rig.flow.cancel_set_pickup_dropoff().unwrap();

    assert_eq!(back, OnTripEditState::CurrentTrip);
    assert!(rig.trips.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn trip_finished_is_reported_from_any_state() {
    let rig = rig();
    rig.trips.set_latency(Duration::from_secs(1));

    rig.flow.trip_finished();
    rig.flow.edit_pickup(existing()).unwrap();
    rig.flow.trip_finished();
    rig.flow.set(bridge(), museum()).unwrap();
    rig.env.settle().await;
    rig.flow.trip_finished();

    assert_eq!(rig.listener.count(|event| *event == ListenerEvent::TripFinished), 3);
    assert_eq!(rig.flow.trip_id(), &TripId::new("trip-9"));
}

#[tokio::test(start_paused = true)]
async fn terminate_stops_update_in_flight() {
    let rig = rig();
    rig.trips.set_latency(Duration::from_millis(500));
    rig.trips.fail_next(6);

    rig.flow.edit_pickup(existing()).unwrap();
    rig.flow.set(bridge(), museum()).unwrap();
    rig.env.settle().await;
    rig.flow.terminate();
    rig.env.advance(Duration::from_secs(10)).await;

    assert_eq!(rig.trips.calls().len(), 1);
    assert_eq!(rig.flow.current_state(), OnTripEditState::UpdatingPickup { new_pickup: bridge() });
}
