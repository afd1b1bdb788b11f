//! Trip request lifecycle.
//!
//! ```text
//!   SelectingPickupDropoff ──set──> ConfirmingTrip ──confirm_trip──> ConfirmingSeats
//!            ^                       │    ^    ^                          │
//!            └──cancel_confirm_trip──┘    │    └──cancel_seat_selection───┤
//!                                         │                            confirm
//!                          creation exhausted                              │
//!                                         │                                v
//!                                         └─────────────────────────── Confirmed
//! ```
//!
//! `confirm_trip` skips `ConfirmingSeats` when seat selection is disabled.
//! Entering `Confirmed` spawns trip creation. Success is reported to the
//! listener and ends the flow's job; exhausting the retry budget rolls back one
//! step to `ConfirmingTrip` with the same locations.

use std::sync::{Arc, Weak};

use rideflow_core::{
    Environment, LocationFocus, NamedLocation, PreTripLocation, StateMachine, StateStream,
    TaskSet, TransitionError, TripInteractor, TripRequest, VehicleSelection, retry,
};
use serde::{Deserialize, Serialize};

use crate::{
    config::PreTripConfig,
    error::FlowError,
    flow::Flow,
    listener::{LocationSelectionListener, PreTripListener, notify},
    location_selection::LocationState,
};

/// State of a [`PreTripFlow`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PreTripState {
    /// Rider picks pickup and dropoff.
    SelectingPickupDropoff {
        /// Pickup to seed location selection with.
        initial_pickup: Option<PreTripLocation>,
        /// Dropoff to seed location selection with.
        initial_dropoff: Option<PreTripLocation>,
        /// Field focused when selection starts.
        focus: LocationFocus,
    },
    /// Rider reviews the trip and picks a vehicle product.
    ConfirmingTrip {
        /// Confirmed pickup.
        pickup: NamedLocation,
        /// Confirmed dropoff.
        dropoff: NamedLocation,
    },
    /// Rider picks a seat count.
    ConfirmingSeats {
        /// Confirmed pickup.
        pickup: NamedLocation,
        /// Confirmed dropoff.
        dropoff: NamedLocation,
        /// Chosen vehicle product.
        vehicle_selection: VehicleSelection,
    },
    /// Request complete, trip creation in flight.
    Confirmed {
        /// Confirmed pickup.
        pickup: NamedLocation,
        /// Confirmed dropoff.
        dropoff: NamedLocation,
        /// Seats requested.
        seat_count: u32,
        /// Chosen vehicle product.
        vehicle_selection: VehicleSelection,
    },
}

impl PreTripState {
    /// Fresh request with nothing selected yet.
    pub fn selecting() -> Self {
        Self::SelectingPickupDropoff {
            initial_pickup: None,
            initial_dropoff: None,
            focus: LocationFocus::Pickup,
        }
    }

    /// Seed for a nested location selection while in `SelectingPickupDropoff`.
    pub fn location_state(&self) -> Option<LocationState> {
        match self {
            Self::SelectingPickupDropoff { initial_pickup, initial_dropoff, focus } => {
                Some(LocationState::new(initial_pickup.clone(), initial_dropoff.clone(), *focus))
            },
            _ => None,
        }
    }

    fn trip_request(&self) -> Option<TripRequest> {
        match self {
            Self::Confirmed { pickup, dropoff, seat_count, vehicle_selection } => {
                Some(TripRequest {
                    pickup: pickup.clone(),
                    dropoff: dropoff.clone(),
                    seat_count: *seat_count,
                    vehicle_selection: vehicle_selection.clone(),
                })
            },
            _ => None,
        }
    }
}

/// Rider's trip request, from location selection to trip creation.
pub struct PreTripFlow<E: Environment> {
    env: E,
    config: PreTripConfig,
    machine: StateMachine<PreTripState>,
    trips: Arc<dyn TripInteractor>,
    listener: Weak<dyn PreTripListener>,
    tasks: TaskSet,
}

impl<E: Environment> PreTripFlow<E> {
    /// Create a flow in [`PreTripState::selecting`].
    pub fn new(
        env: E,
        config: PreTripConfig,
        trips: Arc<dyn TripInteractor>,
        listener: Weak<dyn PreTripListener>,
    ) -> Self {
        Self::with_state(env, config, PreTripState::selecting(), trips, listener)
    }

    /// Create a flow in an arbitrary initial state.
    ///
    /// Starting in `Confirmed` does not trigger trip creation; only entering
    /// it through a mutator does.
    pub fn with_state(
        env: E,
        config: PreTripConfig,
        initial: PreTripState,
        trips: Arc<dyn TripInteractor>,
        listener: Weak<dyn PreTripListener>,
    ) -> Self {
        let machine = StateMachine::new("pre_trip", initial);
        Self { env, config, machine, trips, listener, tasks: TaskSet::new() }
    }

    /// Pickup and dropoff are chosen.
    pub fn set(
        &self,
        pickup: NamedLocation,
        dropoff: NamedLocation,
    ) -> Result<PreTripState, FlowError> {
        let next = self.machine.transition("set", |current| match current {
            PreTripState::SelectingPickupDropoff { .. } => {
                Ok(PreTripState::ConfirmingTrip { pickup, dropoff })
            },
            other => Err(TransitionError::invalid(other, "set")),
        })?;
        Ok(next)
    }

    /// Rider accepted the trip with `vehicle_selection`.
    pub fn confirm_trip(
        &self,
        vehicle_selection: VehicleSelection,
    ) -> Result<PreTripState, FlowError> {
        let config = self.config;
        let next = self.machine.transition("confirm_trip", |current| match current {
            PreTripState::ConfirmingTrip { pickup, dropoff } if config.seat_selection_enabled => {
                Ok(PreTripState::ConfirmingSeats {
                    pickup: pickup.clone(),
                    dropoff: dropoff.clone(),
                    vehicle_selection,
                })
            },
            PreTripState::ConfirmingTrip { pickup, dropoff } => Ok(PreTripState::Confirmed {
                pickup: pickup.clone(),
                dropoff: dropoff.clone(),
                seat_count: config.default_seat_count,
                vehicle_selection,
            }),
            other => Err(TransitionError::invalid(other, "confirm_trip")),
        })?;

        self.create_trip_if_confirmed(&next);
        Ok(next)
    }

    /// Rider picked `seat_count` seats.
    ///
    /// Outside `ConfirmingSeats` this is an invalid transition whatever the
    /// count. From `ConfirmingSeats` an out-of-range count is rejected with
    /// `InvalidSeatCount` and the state is kept.
    pub fn confirm(&self, seat_count: u32) -> Result<PreTripState, FlowError> {
        self.machine.guard("confirm", |current| {
            matches!(current, PreTripState::ConfirmingSeats { .. })
        })?;

        let max = self.config.max_seat_count;
        if !(1..=max).contains(&seat_count) {
            tracing::warn!(seat_count, max, "seat count rejected");
            return Err(FlowError::InvalidSeatCount { requested: seat_count, max });
        }

        let next = self.machine.transition("confirm", |current| match current {
            PreTripState::ConfirmingSeats { pickup, dropoff, vehicle_selection } => {
                Ok(PreTripState::Confirmed {
                    pickup: pickup.clone(),
                    dropoff: dropoff.clone(),
                    seat_count,
                    vehicle_selection: vehicle_selection.clone(),
                })
            },
            other => Err(TransitionError::invalid(other, "confirm")),
        })?;

        self.create_trip_if_confirmed(&next);
        Ok(next)
    }

    /// Back from trip review to location selection, keeping both locations
    /// as already confirmed.
    pub fn cancel_confirm_trip(&self) -> Result<PreTripState, FlowError> {
        let next = self.machine.transition("cancel_confirm_trip", |current| match current {
            PreTripState::ConfirmingTrip { pickup, dropoff } => {
                Ok(PreTripState::SelectingPickupDropoff {
                    initial_pickup: Some(PreTripLocation::confirmed(pickup.clone())),
                    initial_dropoff: Some(PreTripLocation::confirmed(dropoff.clone())),
                    focus: LocationFocus::Pickup,
                })
            },
            other => Err(TransitionError::invalid(other, "cancel_confirm_trip")),
        })?;
        Ok(next)
    }

    /// Back from seat selection to trip review.
    pub fn cancel_seat_selection(&self) -> Result<PreTripState, FlowError> {
        let next = self.machine.transition("cancel_seat_selection", |current| match current {
            PreTripState::ConfirmingSeats { pickup, dropoff, .. } => {
                Ok(PreTripState::ConfirmingTrip { pickup: pickup.clone(), dropoff: dropoff.clone() })
            },
            other => Err(TransitionError::invalid(other, "cancel_seat_selection")),
        })?;
        Ok(next)
    }

    /// Rider abandoned the request.
    pub fn cancel_trip_request(&self) {
        notify(&self.listener, "cancel_pre_trip", |listener| listener.cancel_pre_trip());
    }

    /// Rider left location selection.
    pub fn cancel_set_pickup_dropoff(&self) {
        notify(&self.listener, "cancel_pre_trip", |listener| listener.cancel_pre_trip());
    }

    /// Spawns trip creation when `state` is `Confirmed`.
    fn create_trip_if_confirmed(&self, state: &PreTripState) {
        let Some(request) = state.trip_request() else {
            return;
        };

        let env = self.env.clone();
        let budget = self.config.creation_retry;
        let machine = self.machine.clone();
        let trips = Arc::clone(&self.trips);
        let listener = Weak::clone(&self.listener);

        self.tasks.spawn(&self.env, async move {
            let created =
                retry(&env, budget, "create_trip", || trips.create_trip(&request)).await;

            match created {
                Ok(trip_id) => {
                    tracing::info!(%trip_id, "trip created");
                    notify(&listener, "on_trip_created", |listener| {
                        listener.on_trip_created(trip_id);
                    });
                },
                Err(error) => {
                    tracing::info!(%error, "trip creation failed, rolling back");
                    let rolled_back =
                        machine.transition("rollback_trip_creation", |current| match current {
                            PreTripState::Confirmed { pickup, dropoff, .. } => {
                                Ok(PreTripState::ConfirmingTrip {
                                    pickup: pickup.clone(),
                                    dropoff: dropoff.clone(),
                                })
                            },
                            other => Err(TransitionError::invalid(other, "rollback_trip_creation")),
                        });
                    if rolled_back.is_err() {
                        tracing::debug!("stale trip creation result ignored");
                    }
                },
            }
        });
    }
}

impl<E: Environment> LocationSelectionListener for PreTripFlow<E> {
    fn set(&self, pickup: NamedLocation, dropoff: NamedLocation) {
        if let Err(error) = PreTripFlow::set(self, pickup, dropoff) {
            tracing::warn!(%error, "location selection result dropped");
        }
    }

    fn cancel_set_pickup_dropoff(&self) {
        PreTripFlow::cancel_set_pickup_dropoff(self);
    }
}

impl<E: Environment> Flow for PreTripFlow<E> {
    type State = PreTripState;

    fn observe_state(&self) -> StateStream<PreTripState> {
        self.machine.observe_state()
    }

    fn current_state(&self) -> PreTripState {
        self.machine.current_state()
    }

    fn terminate(&self) {
        self.tasks.abort_all();
        self.machine.terminate();
    }
}

impl<E: Environment> Drop for PreTripFlow<E> {
    fn drop(&mut self) {
        self.terminate();
    }
}
