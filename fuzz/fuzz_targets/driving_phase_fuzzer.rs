//! Fuzz target for the driving phase state machine
//!
//! # Strategy
//!
//! - Arbitrary sequences of navigation start/finish and arrival reports
//! - A reference model predicts the outcome of every mutator
//!
//! # Invariants
//!
//! - Every accepted mutator lands where the model says it should
//! - Every rejected mutator is an invalid transition and leaves the state alone
//! - Navigation never restarts after a completed (not cancelled) drive
//! - The listener hears one arrival per accepted `arrival_confirmed`

#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rideflow_core::{
    ActionType, Coordinate, NamedLocation, StepId, TaskId, TripId, TripResource, VehicleId,
    Waypoint, WaypointAction,
};
use rideflow_flows::{DrivingPhase, DrivingPhaseConfig, DrivingPhaseFlow, Flow, SystemEnv};
use rideflow_harness::{ListenerEvent, RecordingListener, ScriptedVehicle, driving_listener};

#[derive(Debug, Clone, Copy, Arbitrary)]
enum DriverOp {
    StartNavigation,
    FinishedNavigation { cancelled: bool },
    ArrivalConfirmed,
}

fn waypoint() -> Waypoint {
    Waypoint {
        task_id: TaskId::new("task"),
        step_ids: vec![StepId::new("arrive")],
        action: WaypointAction {
            destination: NamedLocation::new("Depot", Coordinate::new(0.0, 0.0)),
            action_type: ActionType::DriveToPickup,
            resource: TripResource {
                trip_id: TripId::new("trip"),
                rider_name: None,
                seat_count: 1,
            },
        },
    }
}

/// Expected state after `op`, or `None` when it must be rejected.
fn model(state: &DrivingPhase, op: DriverOp) -> Option<DrivingPhase> {
    match (op, state) {
        (
            DriverOp::StartNavigation,
            DrivingPhase::DrivePending
            | DrivingPhase::ConfirmingArrival { show_back_to_navigation: true },
        ) => Some(DrivingPhase::Navigating),
        (DriverOp::FinishedNavigation { cancelled }, DrivingPhase::Navigating) => {
            Some(DrivingPhase::ConfirmingArrival { show_back_to_navigation: cancelled })
        },
        (DriverOp::ArrivalConfirmed, DrivingPhase::ConfirmingArrival { .. }) => {
            Some(state.clone())
        },
        _ => None,
    }
}

fuzz_target!(|ops: Vec<DriverOp>| {
    let env = SystemEnv::new();
    let listener = RecordingListener::new();
    let flow = DrivingPhaseFlow::new(
        env,
        DrivingPhaseConfig::default(),
        VehicleId::new("car"),
        waypoint(),
        Arc::new(ScriptedVehicle::new(env)),
        driving_listener(&listener),
    );
    let mut arrivals = 0;

    for op in ops {
        let before = flow.current_state();
        let expected = model(&before, op);

        let result = match op {
            DriverOp::StartNavigation => flow.start_navigation(),
            DriverOp::FinishedNavigation { cancelled } => flow.finished_navigation(cancelled),
            DriverOp::ArrivalConfirmed => flow.arrival_confirmed(),
        };

        match (result, expected) {
            (Ok(state), Some(next)) => {
                assert_eq!(state, next, "{op:?} from {before:?}");
                if matches!(op, DriverOp::ArrivalConfirmed) {
                    arrivals += 1;
                }
            },
            (Err(err), None) => {
                assert!(err.is_invalid_transition(), "{op:?} from {before:?}: {err}");
                assert_eq!(flow.current_state(), before);
            },
            (Ok(state), None) => panic!("{op:?} accepted from {before:?}, landed in {state:?}"),
            (Err(err), Some(next)) => panic!("{op:?} rejected from {before:?}, expected {next:?}: {err}"),
        }
    }

    let reported = listener.count(|event| matches!(event, ListenerEvent::ArrivalConfirmed(_)));
    assert_eq!(reported, arrivals);
});
