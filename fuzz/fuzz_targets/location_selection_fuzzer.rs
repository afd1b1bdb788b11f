//! Fuzz target for location selection nested in a trip request
//!
//! # Strategy
//!
//! - Arbitrary rider input: search results, confirmations, focus changes,
//!   map selection and backing out of confirmation
//! - Trip review navigation on the parent request, without final
//!   confirmation (which would reach the trip service)
//! - A fresh selection is seeded from the request whenever it returns to
//!   location selection, the way a coordinator does
//!
//! # Invariants
//!
//! - Returned steps match the flow's derived step
//! - Rejected mutators are invalid transitions and leave the state alone
//! - A completed pair never lingers: it is reported and cleared in one step
//! - The request only reaches trip review with a pair the rider confirmed

#![no_main]

use std::sync::{Arc, Weak};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rideflow_core::{Coordinate, LocationFocus, NamedLocation, PreTripLocation, VehicleSelection};
use rideflow_flows::{
    Flow, FlowError, LocationSelectionConfig, LocationSelectionFlow, LocationSelectionListener,
    PendingConfirmation, PreTripConfig, PreTripFlow, PreTripState, SystemEnv,
};
use rideflow_harness::{RecordingListener, ScriptedGeocoder, ScriptedTrips, pre_trip_listener};

#[derive(Debug, Clone, Copy, Arbitrary)]
enum RiderOp {
    SelectSearchResult(u8),
    ConfirmPickup(u8),
    ConfirmDropoff(u8),
    SetFocus { dropoff: bool },
    SetPickupOnMap,
    SetDropoffOnMap,
    CancelMapSelection,
    CancelConfirmation,
    ConfirmTrip,
    CancelConfirmTrip,
    CancelSeatSelection,
}

fn place(id: u8) -> NamedLocation {
    let id = id % 8;
    NamedLocation::new(format!("place-{id}"), Coordinate::new(f64::from(id), -f64::from(id)))
}

type Selection = LocationSelectionFlow<SystemEnv>;

fn nested(env: SystemEnv, request: &Arc<PreTripFlow<SystemEnv>>) -> Option<Selection> {
    let seed = request.current_state().location_state()?;
    let parent: Weak<dyn LocationSelectionListener> =
        Arc::<PreTripFlow<SystemEnv>>::downgrade(request);
    Some(LocationSelectionFlow::new(
        env,
        LocationSelectionConfig::default(),
        seed,
        Arc::new(ScriptedGeocoder::new(env)),
        parent,
    ))
}

fn check_rejection(result: Result<(), FlowError>, unchanged: bool) {
    if let Err(err) = result {
        assert!(err.is_invalid_transition(), "unexpected error: {err}");
        assert!(unchanged, "rejected mutator changed state");
    }
}

fuzz_target!(|ops: Vec<RiderOp>| {
    let env = SystemEnv::new();
    let rider = RecordingListener::new();
    let request = Arc::new(PreTripFlow::new(
        env,
        PreTripConfig { seat_selection_enabled: true, ..PreTripConfig::default() },
        Arc::new(ScriptedTrips::new(env)),
        pre_trip_listener(&rider),
    ));
    let mut selection = nested(env, &request);

    for op in ops {
        let request_before = request.current_state();

        if let Some(flow) = &selection {
            let before = flow.current_state();
            let result = match op {
                RiderOp::SelectSearchResult(id) => Some(flow.select_search_result(place(id))),
                RiderOp::ConfirmPickup(id) => Some(flow.confirm_pickup(place(id))),
                RiderOp::ConfirmDropoff(id) => Some(flow.confirm_dropoff(place(id))),
                RiderOp::SetFocus { dropoff } => Some(flow.set_focus(if dropoff {
                    LocationFocus::Dropoff
                } else {
                    LocationFocus::Pickup
                })),
                RiderOp::SetPickupOnMap => Some(flow.set_pickup_on_map()),
                RiderOp::SetDropoffOnMap => Some(flow.set_dropoff_on_map()),
                RiderOp::CancelMapSelection => Some(flow.cancel_map_selection()),
                RiderOp::CancelConfirmation => Some(flow.cancel_confirmation()),
                _ => None,
            };

            if let Some(result) = result {
                let after = flow.current_state();
                if let Ok(step) = &result {
                    assert_eq!(*step, after.step());
                }
                check_rejection(result.map(drop), after == before);
                assert!(
                    !matches!(
                        after.location.pending_confirmation(),
                        Some(PendingConfirmation::Complete { .. })
                    ),
                    "completed pair left pending after {op:?}"
                );

                if let PreTripState::ConfirmingTrip { pickup, dropoff } = request.current_state() {
                    let confirmed = |slot: &Option<PreTripLocation>| {
                        slot.as_ref()
                            .filter(|candidate| candidate.was_confirmed)
                            .map(|candidate| candidate.location.clone())
                    };
                    assert_eq!(confirmed(&after.location.pickup), Some(pickup));
                    assert_eq!(confirmed(&after.location.dropoff), Some(dropoff));
                    selection = None;
                }
                continue;
            }
        }

        let result = match op {
            RiderOp::ConfirmTrip => request.confirm_trip(VehicleSelection::new("std", "Standard")),
            RiderOp::CancelConfirmTrip => request.cancel_confirm_trip(),
            RiderOp::CancelSeatSelection => request.cancel_seat_selection(),
            _ => continue,
        };
        let after = request.current_state();
        if let Ok(state) = &result {
            assert_eq!(*state, after);
            assert!(!matches!(after, PreTripState::Confirmed { .. }));
        }
        check_rejection(result.map(drop), after == request_before);

        if selection.is_none() {
            selection = nested(env, &request);
        }
    }
});
