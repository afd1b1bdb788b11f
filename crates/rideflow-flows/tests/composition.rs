//! Location selection nested inside the pre-trip and on-trip edit flows.

use std::sync::{Arc, Weak};

use rideflow_core::{
    Coordinate, LocationFocus, NamedLocation, TripId, TripLocations, VehicleSelection,
};
use rideflow_flows::{
    Flow, LocationSelectionConfig, LocationSelectionFlow, LocationSelectionListener,
    LocationSelectionStep, LocationState, OnTripEditConfig, OnTripEditFlow, OnTripEditState,
    PreTripConfig, PreTripFlow, PreTripState,
};
use rideflow_harness::{
    ListenerEvent, RecordingListener, ScriptedGeocoder, ScriptedTrips, SimEnv, TripCall,
    on_trip_listener, pre_trip_listener,
};

fn airport() -> NamedLocation {
    NamedLocation::new("Airport", Coordinate::new(35.5494, 139.7798))
}

fn hotel() -> NamedLocation {
    NamedLocation::new("Hotel", Coordinate::new(35.6586, 139.7454))
}

fn temple() -> NamedLocation {
    NamedLocation::new("Temple", Coordinate::new(35.7148, 139.7967))
}

fn nested<P>(env: &SimEnv, seed: LocationState, parent: &Arc<P>) -> LocationSelectionFlow<SimEnv>
where
    P: LocationSelectionListener + 'static,
{
    let listener: Weak<dyn LocationSelectionListener> = Arc::<P>::downgrade(parent);
    LocationSelectionFlow::new(
        env.clone(),
        LocationSelectionConfig::default(),
        seed,
        Arc::new(ScriptedGeocoder::new(env.clone())),
        listener,
    )
}

struct RiderRig {
    env: SimEnv,
    trips: ScriptedTrips<SimEnv>,
    rider: Arc<RecordingListener>,
    pre_trip: Arc<PreTripFlow<SimEnv>>,
}

fn rider_rig() -> RiderRig {
    let env = SimEnv::with_seed(21);
    let trips = ScriptedTrips::new(env.clone());
    let rider = RecordingListener::new();
    let pre_trip = Arc::new(PreTripFlow::new(
        env.clone(),
        PreTripConfig::default(),
        Arc::new(trips.clone()),
        pre_trip_listener(&rider),
    ));
    RiderRig { env, trips, rider, pre_trip }
}

fn select_pair(
    selection: &LocationSelectionFlow<SimEnv>,
    pickup: NamedLocation,
    dropoff: NamedLocation,
) {
    selection.select_search_result(pickup.clone()).unwrap();
    selection.select_search_result(dropoff.clone()).unwrap();
    selection.confirm_dropoff(dropoff).unwrap();
    selection.confirm_pickup(pickup).unwrap();
}

#[tokio::test(start_paused = true)]
async fn confirmed_pair_moves_request_to_trip_review() {
    let rig = rider_rig();
    let seed = rig.pre_trip.current_state().location_state().unwrap();
    let selection = nested(&rig.env, seed, &rig.pre_trip);

    select_pair(&selection, airport(), hotel());
    rig.pre_trip.confirm_trip(VehicleSelection::new("xl", "XL")).unwrap();
    rig.env.settle().await;

    assert_eq!(rig.trips.create_calls(), 1);
    assert_eq!(rig.rider.created_trips(), vec![TripId::new("trip-1")]);
    assert!(matches!(
        rig.pre_trip.current_state(),
        PreTripState::Confirmed { ref pickup, ref dropoff, .. }
            if *pickup == airport() && *dropoff == hotel()
    ));
}

#[test]
fn leaving_selection_cancels_the_request() {
    let rig = rider_rig();
    let selection = nested(&rig.env, LocationState::default(), &rig.pre_trip);

    selection.cancel();

    assert_eq!(rig.rider.events(), vec![ListenerEvent::CancelPreTrip]);
    assert_eq!(rig.pre_trip.current_state(), PreTripState::selecting());
}

#[test]
fn changing_dropoff_after_review_reports_the_new_pair() {
    let rig = rider_rig();
    let first = nested(&rig.env, LocationState::default(), &rig.pre_trip);
    select_pair(&first, airport(), hotel());
    drop(first);

    let back = rig.pre_trip.cancel_confirm_trip().unwrap();
    let selection = nested(&rig.env, back.location_state().unwrap(), &rig.pre_trip);
    assert!(matches!(
        selection.current_step(),
        LocationSelectionStep::SearchingForPickupDropoff { .. }
    ));

    selection.set_focus(LocationFocus::Dropoff).unwrap();
    selection.select_search_result(temple()).unwrap();
    selection.confirm_dropoff(temple()).unwrap();

    assert_eq!(
        rig.pre_trip.current_state(),
        PreTripState::ConfirmingTrip { pickup: airport(), dropoff: temple() }
    );
}

#[test]
fn dropped_parent_turns_completion_into_no_op() {
    let rig = rider_rig();
    let selection = nested(&rig.env, LocationState::default(), &rig.pre_trip);
    let RiderRig { pre_trip, rider, .. } = rig;
    drop(pre_trip);

    select_pair(&selection, airport(), hotel());

    assert!(rider.events().is_empty());
    assert!(!selection.current_state().location.changed_by_user);
}

struct EditRig {
    env: SimEnv,
    trips: ScriptedTrips<SimEnv>,
    edit: Arc<OnTripEditFlow<SimEnv>>,
}

fn edit_rig() -> EditRig {
    let env = SimEnv::with_seed(22);
    let trips = ScriptedTrips::new(env.clone());
    let rider = RecordingListener::new();
    let edit = Arc::new(OnTripEditFlow::new(
        env.clone(),
        OnTripEditConfig::default(),
        TripId::new("trip-5"),
        Arc::new(trips.clone()),
        on_trip_listener(&rider),
    ));
    EditRig { env, trips, edit }
}

#[tokio::test(start_paused = true)]
async fn edited_dropoff_is_sent_after_confirmation() {
    let rig = edit_rig();
    let editing = rig
        .edit
        .edit_dropoff(TripLocations { pickup: airport(), dropoff: hotel() })
        .unwrap();
    let selection = nested(&rig.env, editing.location_state().unwrap(), &rig.edit);

    let confirming = selection.select_search_result(temple()).unwrap();
    selection.confirm_dropoff(temple()).unwrap();
    rig.env.settle().await;

    assert_eq!(confirming, LocationSelectionStep::ConfirmingDropoff { dropoff: temple() });
    assert_eq!(
        rig.edit.current_state(),
        OnTripEditState::UpdatingDropoff { new_dropoff: temple() }
    );
    assert_eq!(
        rig.trips.calls(),
        vec![TripCall::UpdateDropoff(TripId::new("trip-5"), temple())]
    );
}

#[test]
fn leaving_edit_selection_returns_to_current_trip() {
    let rig = edit_rig();
    let editing = rig
        .edit
        .edit_pickup(TripLocations { pickup: airport(), dropoff: hotel() })
        .unwrap();
    let selection = nested(&rig.env, editing.location_state().unwrap(), &rig.edit);

    selection.cancel();

    assert_eq!(rig.edit.current_state(), OnTripEditState::CurrentTrip);
    assert!(rig.trips.calls().is_empty());
}
