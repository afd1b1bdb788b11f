//! What the standard registry reports for traces that break it.

use rideflow_core::TripId;
use rideflow_flows::{ConfirmationState, DrivingPhase};
use rideflow_harness::{FlowTrace, InvariantRegistry, ListenerEvent};

fn broken_trace() -> FlowTrace {
    FlowTrace {
        driving: vec![
            DrivingPhase::DrivePending,
            DrivingPhase::Navigating,
            DrivingPhase::ConfirmingArrival { show_back_to_navigation: false },
            DrivingPhase::Navigating,
        ],
        confirmation: vec![
            ConfirmationState::Unconfirmed,
            ConfirmationState::Confirming,
            ConfirmationState::Confirmed,
            ConfirmationState::Confirming,
        ],
        events: vec![
            ListenerEvent::TripCreated(TripId::new("trip-1")),
            ListenerEvent::TripCreated(TripId::new("trip-2")),
        ],
        ..FlowTrace::empty()
    }
}

#[test]
fn every_broken_invariant_is_reported_in_registry_order() {
    let violations = InvariantRegistry::standard().check_all(&broken_trace()).unwrap_err();

    let report: Vec<_> = violations.iter().map(ToString::to_string).collect();
    insta::assert_snapshot!(report.join("\n"), @r"
    SingleTripCreation: 2 trips created
    NavigationReentryGuarded: navigation entered from ConfirmingArrival { show_back_to_navigation: false }
    ConfirmedIsTerminal: [Confirming] emitted after Confirmed
    ");
}

#[test]
fn clean_driver_trace_passes() {
    let trace = FlowTrace {
        driving: vec![
            DrivingPhase::DrivePending,
            DrivingPhase::Navigating,
            DrivingPhase::ConfirmingArrival { show_back_to_navigation: true },
            DrivingPhase::Navigating,
        ],
        confirmation: vec![
            ConfirmationState::Unconfirmed,
            ConfirmationState::Confirming,
            ConfirmationState::Failed,
            ConfirmationState::Confirming,
            ConfirmationState::Confirmed,
        ],
        ..FlowTrace::empty()
    };

    assert!(InvariantRegistry::standard().check_all(&trace).is_ok());
}

#[test]
#[should_panic(expected = "Invariant violation after driver run:\n  SingleTripCreation")]
fn assert_all_names_the_context_and_each_violation() {
    InvariantRegistry::standard().assert_all(&broken_trace(), "after driver run");
}
