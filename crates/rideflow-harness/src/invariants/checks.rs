//! Invariants registered by [`super::InvariantRegistry::standard`].
//!
//! Each check looks at one flow's emitted states (or the listener events)
//! and holds for any mutator order and any collaborator failure pattern.

use rideflow_flows::{ConfirmationState, DrivingPhase, LocationSelection, PreTripState};

use super::{FlowTrace, Invariant, InvariantResult};
use crate::listener::ListenerEvent;

/// Every completed location pair is reported exactly once.
///
/// A pair is settled when both locations are confirmed and no user change is
/// pending. Every transition from a user-changed state into a settled pair
/// must have produced one `set`; `set` can only come from transitions that
/// end in a settled pair.
pub struct PairReportedOnce;

fn is_settled(selection: &LocationSelection) -> bool {
    let location = &selection.location;
    !location.changed_by_user
        && location.pickup.as_ref().is_some_and(|pickup| pickup.was_confirmed)
        && location.dropoff.as_ref().is_some_and(|dropoff| dropoff.was_confirmed)
}

impl Invariant for PairReportedOnce {
    fn name(&self) -> &'static str {
        "PairReportedOnce"
    }

    fn check(&self, trace: &FlowTrace) -> InvariantResult {
        if trace.location.is_empty() {
            return Ok(());
        }

        let reported = trace.count_events(|event| matches!(event, ListenerEvent::Set { .. }));
        let into_settled = trace.location.windows(2).filter(|w| is_settled(&w[1]));
        let at_most = into_settled.clone().count();
        let at_least = into_settled.filter(|w| w[0].location.changed_by_user).count();

        if reported < at_least || reported > at_most {
            return Err(self.violation(format!(
                "{reported} set notification(s), expected between {at_least} and {at_most}"
            )));
        }
        Ok(())
    }
}

/// Pre-trip states only move along the edges of the request lifecycle.
///
/// Leaving `Confirmed` is only possible as a rollback to `ConfirmingTrip`
/// with the same pickup and dropoff.
pub struct PreTripEdgesValid;

impl Invariant for PreTripEdgesValid {
    fn name(&self) -> &'static str {
        "PreTripEdgesValid"
    }

    fn check(&self, trace: &FlowTrace) -> InvariantResult {
        use PreTripState::{ConfirmingSeats, ConfirmingTrip, Confirmed, SelectingPickupDropoff};

        for window in trace.pre_trip.windows(2) {
            let valid = match (&window[0], &window[1]) {
                (SelectingPickupDropoff { .. }, ConfirmingTrip { .. })
                | (ConfirmingTrip { .. }, SelectingPickupDropoff { .. })
                | (ConfirmingTrip { .. }, ConfirmingSeats { .. } | Confirmed { .. })
                | (ConfirmingSeats { .. }, ConfirmingTrip { .. } | Confirmed { .. }) => true,
                (
                    Confirmed { pickup, dropoff, .. },
                    ConfirmingTrip { pickup: back_pickup, dropoff: back_dropoff },
                ) => pickup == back_pickup && dropoff == back_dropoff,
                _ => false,
            };

            if !valid {
                return Err(self.violation(format!(
                    "invalid edge {:?} -> {:?}",
                    window[0], window[1]
                )));
            }
        }
        Ok(())
    }
}

/// At most one trip is created per run, and the request stays confirmed.
pub struct SingleTripCreation;

impl Invariant for SingleTripCreation {
    fn name(&self) -> &'static str {
        "SingleTripCreation"
    }

    fn check(&self, trace: &FlowTrace) -> InvariantResult {
        let created =
            trace.count_events(|event| matches!(event, ListenerEvent::TripCreated(_)));
        if created > 1 {
            return Err(self.violation(format!("{created} trips created")));
        }

        if created == 1
            && let Some(last) = trace.pre_trip.last()
            && !matches!(last, PreTripState::Confirmed { .. })
        {
            return Err(self.violation(format!("trip created but request ended in {last:?}")));
        }
        Ok(())
    }
}

/// Navigation starts from `DrivePending` and only resumes when offered.
pub struct NavigationReentryGuarded;

impl Invariant for NavigationReentryGuarded {
    fn name(&self) -> &'static str {
        "NavigationReentryGuarded"
    }

    fn check(&self, trace: &FlowTrace) -> InvariantResult {
        if let Some(first) = trace.driving.first()
            && *first != DrivingPhase::DrivePending
        {
            return Err(self.violation(format!("driving phase started in {first:?}")));
        }

        for window in trace.driving.windows(2) {
            let entered_navigation = window[1] == DrivingPhase::Navigating;
            let allowed = matches!(
                window[0],
                DrivingPhase::DrivePending
                    | DrivingPhase::ConfirmingArrival { show_back_to_navigation: true }
            );
            if entered_navigation && !allowed {
                return Err(self.violation(format!("navigation entered from {:?}", window[0])));
            }
        }
        Ok(())
    }
}

/// Nothing is emitted after a confirmation completes.
pub struct ConfirmedIsTerminal;

impl Invariant for ConfirmedIsTerminal {
    fn name(&self) -> &'static str {
        "ConfirmedIsTerminal"
    }

    fn check(&self, trace: &FlowTrace) -> InvariantResult {
        let confirmed_at =
            trace.confirmation.iter().position(|state| *state == ConfirmationState::Confirmed);

        match confirmed_at {
            Some(index) if index + 1 < trace.confirmation.len() => Err(self.violation(format!(
                "{:?} emitted after Confirmed",
                &trace.confirmation[index + 1..]
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use rideflow_core::{Coordinate, LocationFocus, NamedLocation, PreTripLocation, TripId};
    use rideflow_flows::LocationState;

    use super::*;

    fn place(title: &str) -> NamedLocation {
        NamedLocation::new(title, Coordinate::new(1.0, 2.0))
    }

    fn selection(changed_by_user: bool, confirmed: bool) -> LocationSelection {
        let wrap = if confirmed { PreTripLocation::confirmed } else { PreTripLocation::unconfirmed };
        LocationSelection {
            location: LocationState {
                pickup: Some(wrap(place("A"))),
                dropoff: Some(wrap(place("B"))),
                changed_by_user,
                focus: LocationFocus::Pickup,
            },
            map_target: None,
            pickup_search_enabled: true,
            dropoff_search_enabled: true,
        }
    }

    fn set_event() -> ListenerEvent {
        ListenerEvent::Set { pickup: place("A"), dropoff: place("B") }
    }

    #[test]
    fn missing_set_is_a_violation() {
        let trace = FlowTrace {
            location: vec![selection(true, false), selection(false, true)],
            ..FlowTrace::empty()
        };

        assert!(PairReportedOnce.check(&trace).is_err());
    }

    #[test]
    fn duplicate_set_is_a_violation() {
        let trace = FlowTrace {
            location: vec![selection(true, false), selection(false, true)],
            events: vec![set_event(), set_event()],
            ..FlowTrace::empty()
        };

        assert!(PairReportedOnce.check(&trace).is_err());
    }

    #[test]
    fn single_set_for_single_completion_holds() {
        let trace = FlowTrace {
            location: vec![selection(true, false), selection(false, true)],
            events: vec![set_event()],
            ..FlowTrace::empty()
        };

        assert!(PairReportedOnce.check(&trace).is_ok());
    }

    #[test]
    fn rollback_must_keep_locations() {
        let confirmed = PreTripState::Confirmed {
            pickup: place("A"),
            dropoff: place("B"),
            seat_count: 1,
            vehicle_selection: rideflow_core::VehicleSelection::new("x", "X"),
        };
        let moved = PreTripState::ConfirmingTrip { pickup: place("C"), dropoff: place("B") };
        let trace = FlowTrace { pre_trip: vec![confirmed, moved], ..FlowTrace::empty() };

        assert!(PreTripEdgesValid.check(&trace).is_err());
    }

    #[test]
    fn second_trip_is_a_violation() {
        let trace = FlowTrace {
            events: vec![
                ListenerEvent::TripCreated(TripId::new("trip-1")),
                ListenerEvent::TripCreated(TripId::new("trip-2")),
            ],
            ..FlowTrace::empty()
        };

        assert!(SingleTripCreation.check(&trace).is_err());
    }

    #[test]
    fn navigation_from_completed_arrival_is_a_violation() {
        let trace = FlowTrace {
            driving: vec![
                DrivingPhase::DrivePending,
                DrivingPhase::Navigating,
                DrivingPhase::ConfirmingArrival { show_back_to_navigation: false },
                DrivingPhase::Navigating,
            ],
            ..FlowTrace::empty()
        };

        let violation = NavigationReentryGuarded.check(&trace).unwrap_err();

        assert_eq!(violation.invariant, "NavigationReentryGuarded");
    }

    #[test]
    fn emission_after_confirmed_is_a_violation() {
        let trace = FlowTrace {
            confirmation: vec![
                ConfirmationState::Unconfirmed,
                ConfirmationState::Confirming,
                ConfirmationState::Confirmed,
                ConfirmationState::Confirming,
            ],
            ..FlowTrace::empty()
        };

        assert!(ConfirmedIsTerminal.check(&trace).is_err());
    }
}
