//! Pickup and dropoff edits on a matched trip.
//!
//! ```text
//!   CurrentTrip ──edit_pickup──> EditingPickup ──set──> UpdatingPickup ──┐
//!        ^   └───edit_dropoff──> EditingDropoff ──set──> UpdatingDropoff ─┤
//!        │                           │                                    │
//!        └── cancel_set_pickup_dropoff, edit_confirmed, update exhausted ─┘
//! ```
//!
//! A successful update call does not change state. The trip service confirms
//! the edit through a separate polling collaborator, which reports back via
//! [`OnTripEditFlow::edit_confirmed`].

use std::sync::{Arc, Weak};

use rideflow_core::{
    Environment, LocationFocus, NamedLocation, PreTripLocation, StateMachine, StateStream,
    TaskSet, TransitionError, TripId, TripInteractor, TripLocations, retry,
};
use serde::{Deserialize, Serialize};

use crate::{
    config::OnTripEditConfig,
    error::FlowError,
    flow::Flow,
    listener::{LocationSelectionListener, OnTripListener, notify},
    location_selection::LocationState,
};

/// State of an [`OnTripEditFlow`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OnTripEditState {
    /// No edit in progress.
    CurrentTrip,
    /// Rider picks a new pickup.
    EditingPickup {
        /// Pickup before the edit.
        existing_pickup: NamedLocation,
        /// Dropoff before the edit.
        existing_dropoff: NamedLocation,
    },
    /// Rider picks a new dropoff.
    EditingDropoff {
        /// Pickup before the edit.
        existing_pickup: NamedLocation,
        /// Dropoff before the edit.
        existing_dropoff: NamedLocation,
    },
    /// New pickup sent to the trip service.
    UpdatingPickup {
        /// Requested pickup.
        new_pickup: NamedLocation,
    },
    /// New dropoff sent to the trip service.
    UpdatingDropoff {
        /// Requested dropoff.
        new_dropoff: NamedLocation,
    },
}

impl OnTripEditState {
    /// Seed for a nested location selection while editing.
    ///
    /// Both existing locations start out confirmed and focus is on the field
    /// being edited.
    pub fn location_state(&self) -> Option<LocationState> {
        let (existing_pickup, existing_dropoff, focus) = match self {
            Self::EditingPickup { existing_pickup, existing_dropoff } => {
                (existing_pickup, existing_dropoff, LocationFocus::Pickup)
            },
            Self::EditingDropoff { existing_pickup, existing_dropoff } => {
                (existing_pickup, existing_dropoff, LocationFocus::Dropoff)
            },
            _ => return None,
        };
        Some(LocationState::new(
            Some(PreTripLocation::confirmed(existing_pickup.clone())),
            Some(PreTripLocation::confirmed(existing_dropoff.clone())),
            focus,
        ))
    }
}

/// Which location an update call changes.
#[derive(Debug, Clone, Copy)]
enum Edit {
    Pickup,
    Dropoff,
}

/// Post-match pickup/dropoff edits for one trip.
pub struct OnTripEditFlow<E: Environment> {
    env: E,
    config: OnTripEditConfig,
    trip_id: TripId,
    machine: StateMachine<OnTripEditState>,
    trips: Arc<dyn TripInteractor>,
    listener: Weak<dyn OnTripListener>,
    tasks: TaskSet,
}

impl<E: Environment> OnTripEditFlow<E> {
    /// Create a flow for `trip_id` in `CurrentTrip`.
    pub fn new(
        env: E,
        config: OnTripEditConfig,
        trip_id: TripId,
        trips: Arc<dyn TripInteractor>,
        listener: Weak<dyn OnTripListener>,
    ) -> Self {
        let machine = StateMachine::new("on_trip_edit", OnTripEditState::CurrentTrip);
        Self { env, config, trip_id, machine, trips, listener, tasks: TaskSet::new() }
    }

    /// Trip being edited.
    pub fn trip_id(&self) -> &TripId {
        &self.trip_id
    }

    /// Start editing the pickup of a trip currently at `existing`.
    pub fn edit_pickup(&self, existing: TripLocations) -> Result<OnTripEditState, FlowError> {
        let next = self.machine.transition("edit_pickup", |current| match current {
            OnTripEditState::CurrentTrip => Ok(OnTripEditState::EditingPickup {
                existing_pickup: existing.pickup,
                existing_dropoff: existing.dropoff,
            }),
            other => Err(TransitionError::invalid(other, "edit_pickup")),
        })?;
        Ok(next)
    }

    /// Start editing the dropoff of a trip currently at `existing`.
    pub fn edit_dropoff(&self, existing: TripLocations) -> Result<OnTripEditState, FlowError> {
        let next = self.machine.transition("edit_dropoff", |current| match current {
            OnTripEditState::CurrentTrip => Ok(OnTripEditState::EditingDropoff {
                existing_pickup: existing.pickup,
                existing_dropoff: existing.dropoff,
            }),
            other => Err(TransitionError::invalid(other, "edit_dropoff")),
        })?;
        Ok(next)
    }

    /// New locations chosen. Sends the edited one to the trip service.
    pub fn set(
        &self,
        pickup: NamedLocation,
        dropoff: NamedLocation,
    ) -> Result<OnTripEditState, FlowError> {
        let next = self.machine.transition("set", |current| match current {
            OnTripEditState::EditingPickup { .. } => {
                Ok(OnTripEditState::UpdatingPickup { new_pickup: pickup })
            },
            OnTripEditState::EditingDropoff { .. } => {
                Ok(OnTripEditState::UpdatingDropoff { new_dropoff: dropoff })
            },
            other => Err(TransitionError::invalid(other, "set")),
        })?;

        match &next {
            OnTripEditState::UpdatingPickup { new_pickup } => {
                self.send_update(Edit::Pickup, new_pickup.clone());
            },
            OnTripEditState::UpdatingDropoff { new_dropoff } => {
                self.send_update(Edit::Dropoff, new_dropoff.clone());
            },
            _ => {},
        }
        Ok(next)
    }

    /// The trip service confirmed the pending edit.
    pub fn edit_confirmed(&self) -> Result<OnTripEditState, FlowError> {
        let next = self.machine.transition("edit_confirmed", |current| match current {
            OnTripEditState::UpdatingPickup { .. } | OnTripEditState::UpdatingDropoff { .. } => {
                Ok(OnTripEditState::CurrentTrip)
            },
            other => Err(TransitionError::invalid(other, "edit_confirmed")),
        })?;
        tracing::info!(trip_id = %self.trip_id, "trip edit confirmed");
        Ok(next)
    }

    /// Rider abandoned the edit.
    pub fn cancel_set_pickup_dropoff(&self) -> Result<OnTripEditState, FlowError> {
        let next = self.machine.transition("cancel_set_pickup_dropoff", |current| match current {
            OnTripEditState::EditingPickup { .. } | OnTripEditState::EditingDropoff { .. } => {
                Ok(OnTripEditState::CurrentTrip)
            },
            other => Err(TransitionError::invalid(other, "cancel_set_pickup_dropoff")),
        })?;
        Ok(next)
    }

    /// The trip ended. Valid from every state.
    pub fn trip_finished(&self) {
        notify(&self.listener, "trip_finished", |listener| listener.trip_finished());
    }

    fn send_update(&self, edit: Edit, location: NamedLocation) {
        let env = self.env.clone();
        let budget = self.config.edit_retry;
        let machine = self.machine.clone();
        let trips = Arc::clone(&self.trips);
        let trip_id = self.trip_id.clone();

        self.tasks.spawn(&self.env, async move {
            let updated = match edit {
                Edit::Pickup => {
                    retry(&env, budget, "update_pickup", || {
                        trips.update_pickup(&trip_id, &location)
                    })
                    .await
                },
                Edit::Dropoff => {
                    retry(&env, budget, "update_dropoff", || {
                        trips.update_dropoff(&trip_id, &location)
                    })
                    .await
                },
            };

            let Err(error) = updated else {
                tracing::debug!(%trip_id, ?edit, "edit sent, awaiting confirmation");
                return;
            };

            tracing::info!(%trip_id, %error, "trip edit failed, rolling back");
            let rolled_back = machine.transition("rollback_edit", |current| match (edit, current) {
                (Edit::Pickup, OnTripEditState::UpdatingPickup { new_pickup })
                    if *new_pickup == location =>
                {
                    Ok(OnTripEditState::CurrentTrip)
                },
                (Edit::Dropoff, OnTripEditState::UpdatingDropoff { new_dropoff })
                    if *new_dropoff == location =>
                {
                    Ok(OnTripEditState::CurrentTrip)
                },
                (_, other) => Err(TransitionError::invalid(other, "rollback_edit")),
            });
            if rolled_back.is_err() {
                tracing::debug!(%trip_id, "stale edit result ignored");
            }
        });
    }
}

impl<E: Environment> LocationSelectionListener for OnTripEditFlow<E> {
    fn set(&self, pickup: NamedLocation, dropoff: NamedLocation) {
        if let Err(error) = OnTripEditFlow::set(self, pickup, dropoff) {
            tracing::warn!(%error, "location selection result dropped");
        }
    }

    fn cancel_set_pickup_dropoff(&self) {
        if let Err(error) = OnTripEditFlow::cancel_set_pickup_dropoff(self) {
            tracing::warn!(%error, "location selection cancel dropped");
        }
    }
}

impl<E: Environment> Flow for OnTripEditFlow<E> {
    type State = OnTripEditState;

    fn observe_state(&self) -> StateStream<OnTripEditState> {
        self.machine.observe_state()
    }

    fn current_state(&self) -> OnTripEditState {
        self.machine.current_state()
    }

    fn terminate(&self) {
        self.tasks.abort_all();
        self.machine.terminate();
    }
}

impl<E: Environment> Drop for OnTripEditFlow<E> {
    fn drop(&mut self) {
        self.terminate();
    }
}
