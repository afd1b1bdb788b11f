//! Pickup and dropoff selection.
//!
//! The flow keeps a single [`LocationSelection`] cell: the raw
//! [`LocationState`] plus an optional map-selection override. The step shown
//! to the rider is derived from that cell by [`LocationSelection::step`]:
//!
//! ```text
//!   map override active ──────────────────────────> SettingPickup/DropoffOnMap
//!   both set + changed_by_user
//!       dropoff unconfirmed ──────────────────────> ConfirmingDropoff
//!       pickup unconfirmed ───────────────────────> ConfirmingPickup
//!       both confirmed ──> listener.set(..) ──────> SearchingForPickupDropoff
//!   otherwise ────────────────────────────────────> SearchingForPickupDropoff
//! ```
//!
//! A confirmed pair is reported from inside the transition that completes it,
//! and `changed_by_user` is cleared in that same transition, so the listener
//! hears about each pair once.

use std::sync::{Arc, Weak};

use futures::{Stream, StreamExt};
use rideflow_core::{
    CollaboratorError, Coordinate, Environment, GeocodeInteractor, LocationFocus, NamedLocation,
    PreTripLocation, StateMachine, StateStream, TransitionError, retry,
};
use serde::{Deserialize, Serialize};

use crate::{
    config::LocationSelectionConfig,
    error::FlowError,
    flow::Flow,
    listener::{LocationSelectionListener, notify},
};

/// Raw pickup/dropoff selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationState {
    /// Pickup candidate.
    pub pickup: Option<PreTripLocation>,
    /// Dropoff candidate.
    pub dropoff: Option<PreTripLocation>,
    /// The rider changed a location since the pair was last reported.
    pub changed_by_user: bool,
    /// Field receiving search results.
    pub focus: LocationFocus,
}

impl LocationState {
    /// Selection seeded from existing locations, not yet changed by the rider.
    pub fn new(
        pickup: Option<PreTripLocation>,
        dropoff: Option<PreTripLocation>,
        focus: LocationFocus,
    ) -> Self {
        Self { pickup, dropoff, changed_by_user: false, focus }
    }

    /// What still needs confirming, if the rider changed a complete pair.
    ///
    /// Dropoff is always confirmed before pickup.
    pub fn pending_confirmation(&self) -> Option<PendingConfirmation> {
        if !self.changed_by_user {
            return None;
        }
        let (pickup, dropoff) = (self.pickup.as_ref()?, self.dropoff.as_ref()?);

        let pending = if !dropoff.was_confirmed {
            PendingConfirmation::Dropoff(dropoff.location.clone())
        } else if !pickup.was_confirmed {
            PendingConfirmation::Pickup(pickup.location.clone())
        } else {
            PendingConfirmation::Complete {
                pickup: pickup.location.clone(),
                dropoff: dropoff.location.clone(),
            }
        };
        Some(pending)
    }
}

impl Default for LocationState {
    fn default() -> Self {
        Self::new(None, None, LocationFocus::Pickup)
    }
}

/// Outcome of [`LocationState::pending_confirmation`].
#[derive(Debug, Clone, PartialEq)]
pub enum PendingConfirmation {
    /// Dropoff awaits confirmation.
    Dropoff(NamedLocation),
    /// Dropoff is confirmed, pickup awaits confirmation.
    Pickup(NamedLocation),
    /// Both locations are confirmed.
    Complete {
        /// Confirmed pickup.
        pickup: NamedLocation,
        /// Confirmed dropoff.
        dropoff: NamedLocation,
    },
}

/// Location being placed on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapTarget {
    /// Pickup is being placed.
    Pickup,
    /// Dropoff is being placed.
    Dropoff,
}

/// Step shown to the rider.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationSelectionStep {
    /// Search fields for pickup and dropoff.
    SearchingForPickupDropoff {
        /// Pickup field accepts search input.
        pickup_search_enabled: bool,
        /// Dropoff field accepts search input.
        dropoff_search_enabled: bool,
        /// Field receiving search results.
        focus: LocationFocus,
    },
    /// Rider confirms the pickup.
    ConfirmingPickup {
        /// Pickup awaiting confirmation.
        pickup: NamedLocation,
    },
    /// Rider confirms the dropoff.
    ConfirmingDropoff {
        /// Dropoff awaiting confirmation.
        dropoff: NamedLocation,
    },
    /// Rider drags the map to place the pickup.
    SettingPickupOnMap,
    /// Rider drags the map to place the dropoff.
    SettingDropoffOnMap,
}

/// State cell of a [`LocationSelectionFlow`].
#[derive(Debug, Clone, PartialEq)]
pub struct LocationSelection {
    /// Raw selection.
    pub location: LocationState,
    /// Active map-selection override.
    pub map_target: Option<MapTarget>,
    /// Pickup field accepts search input.
    pub pickup_search_enabled: bool,
    /// Dropoff field accepts search input.
    pub dropoff_search_enabled: bool,
}

impl LocationSelection {
    /// Derive the step shown to the rider.
    pub fn step(&self) -> LocationSelectionStep {
        match self.map_target {
            Some(MapTarget::Pickup) => return LocationSelectionStep::SettingPickupOnMap,
            Some(MapTarget::Dropoff) => return LocationSelectionStep::SettingDropoffOnMap,
            None => {},
        }

        match self.location.pending_confirmation() {
            Some(PendingConfirmation::Dropoff(dropoff)) => {
                LocationSelectionStep::ConfirmingDropoff { dropoff }
            },
            Some(PendingConfirmation::Pickup(pickup)) => {
                LocationSelectionStep::ConfirmingPickup { pickup }
            },
            Some(PendingConfirmation::Complete { .. }) | None => {
                LocationSelectionStep::SearchingForPickupDropoff {
                    pickup_search_enabled: self.pickup_search_enabled,
                    dropoff_search_enabled: self.dropoff_search_enabled,
                    focus: self.location.focus,
                }
            },
        }
    }

    fn is_searching(&self) -> bool {
        matches!(self.step(), LocationSelectionStep::SearchingForPickupDropoff { .. })
    }

    fn is_confirming(&self) -> bool {
        matches!(
            self.step(),
            LocationSelectionStep::ConfirmingPickup { .. }
                | LocationSelectionStep::ConfirmingDropoff { .. }
        )
    }

    fn with_pickup(&self, pickup: PreTripLocation) -> Self {
        let mut next = self.clone();
        next.location.pickup = Some(pickup);
        next.location.changed_by_user = true;
        next.map_target = None;
        next
    }

    fn with_dropoff(&self, dropoff: PreTripLocation) -> Self {
        let mut next = self.clone();
        next.location.dropoff = Some(dropoff);
        next.location.changed_by_user = true;
        next.map_target = None;
        next
    }
}

/// Pickup/dropoff selection for a trip request or a trip edit.
pub struct LocationSelectionFlow<E: Environment> {
    env: E,
    config: LocationSelectionConfig,
    machine: StateMachine<LocationSelection>,
    geocoder: Arc<dyn GeocodeInteractor>,
    listener: Weak<dyn LocationSelectionListener>,
}

impl<E: Environment> LocationSelectionFlow<E> {
    /// Create a flow seeded with `initial`.
    pub fn new(
        env: E,
        config: LocationSelectionConfig,
        initial: LocationState,
        geocoder: Arc<dyn GeocodeInteractor>,
        listener: Weak<dyn LocationSelectionListener>,
    ) -> Self {
        let selection = LocationSelection {
            location: initial,
            map_target: None,
            pickup_search_enabled: config.pickup_search_enabled,
            dropoff_search_enabled: config.dropoff_search_enabled,
        };
        let machine = StateMachine::new("location_selection", selection);
        Self { env, config, machine, geocoder, listener }
    }

    /// Current step.
    pub fn current_step(&self) -> LocationSelectionStep {
        self.machine.current_state().step()
    }

    /// Stream of derived steps, starting with the current one.
    pub fn observe_steps(&self) -> impl Stream<Item = LocationSelectionStep> + Send + Unpin {
        self.machine.observe_state().map(|selection| selection.step())
    }

    /// Stream of the raw selection, starting with the current one.
    pub fn observe_location_state(&self) -> impl Stream<Item = LocationState> + Send + Unpin {
        self.machine.observe_state().map(|selection| selection.location)
    }

    /// Put a search result into the focused field.
    ///
    /// Choosing a pickup while the dropoff is still empty moves focus to the
    /// dropoff.
    pub fn select_search_result(
        &self,
        location: NamedLocation,
    ) -> Result<LocationSelectionStep, FlowError> {
        self.apply("select_search_result", |current| {
            if !current.is_searching() {
                return Err(TransitionError::invalid(current, "select_search_result"));
            }
            let candidate = PreTripLocation::unconfirmed(location);
            Ok(match current.location.focus {
                LocationFocus::Pickup => {
                    let mut next = current.with_pickup(candidate);
                    if next.location.dropoff.is_none() {
                        next.location.focus = LocationFocus::Dropoff;
                    }
                    next
                },
                LocationFocus::Dropoff => current.with_dropoff(candidate),
            })
        })
    }

    /// Confirm the pickup, from the pickup confirmation or pickup map step.
    pub fn confirm_pickup(
        &self,
        location: NamedLocation,
    ) -> Result<LocationSelectionStep, FlowError> {
        self.apply("confirm_pickup", |current| match current.step() {
            LocationSelectionStep::ConfirmingPickup { .. }
            | LocationSelectionStep::SettingPickupOnMap => {
                Ok(current.with_pickup(PreTripLocation::confirmed(location)))
            },
            _ => Err(TransitionError::invalid(current, "confirm_pickup")),
        })
    }

    /// Confirm the dropoff, from the dropoff confirmation or dropoff map step.
    pub fn confirm_dropoff(
        &self,
        location: NamedLocation,
    ) -> Result<LocationSelectionStep, FlowError> {
        self.apply("confirm_dropoff", |current| match current.step() {
            LocationSelectionStep::ConfirmingDropoff { .. }
            | LocationSelectionStep::SettingDropoffOnMap => {
                Ok(current.with_dropoff(PreTripLocation::confirmed(location)))
            },
            _ => Err(TransitionError::invalid(current, "confirm_dropoff")),
        })
    }

    /// Move search focus.
    pub fn set_focus(&self, focus: LocationFocus) -> Result<LocationSelectionStep, FlowError> {
        self.apply("set_focus", |current| {
            if !current.is_searching() {
                return Err(TransitionError::invalid(current, "set_focus"));
            }
            let mut next = current.clone();
            next.location.focus = focus;
            Ok(next)
        })
    }

    /// Start placing the pickup on the map.
    pub fn set_pickup_on_map(&self) -> Result<LocationSelectionStep, FlowError> {
        self.enter_map_selection("set_pickup_on_map", MapTarget::Pickup)
    }

    /// Start placing the dropoff on the map.
    pub fn set_dropoff_on_map(&self) -> Result<LocationSelectionStep, FlowError> {
        self.enter_map_selection("set_dropoff_on_map", MapTarget::Dropoff)
    }

    fn enter_map_selection(
        &self,
        operation: &'static str,
        target: MapTarget,
    ) -> Result<LocationSelectionStep, FlowError> {
        self.apply(operation, |current| {
            if current.map_target.is_some() {
                return Err(TransitionError::invalid(current, operation));
            }
            Ok(LocationSelection { map_target: Some(target), ..current.clone() })
        })
    }

    /// Leave map selection without changing any location.
    pub fn cancel_map_selection(&self) -> Result<LocationSelectionStep, FlowError> {
        self.apply("cancel_map_selection", |current| {
            if current.map_target.is_none() {
                return Err(TransitionError::invalid(current, "cancel_map_selection"));
            }
            Ok(LocationSelection { map_target: None, ..current.clone() })
        })
    }

    /// Back out of a confirmation step to search, keeping both candidates.
    pub fn cancel_confirmation(&self) -> Result<LocationSelectionStep, FlowError> {
        self.apply("cancel_confirmation", |current| {
            if !current.is_confirming() {
                return Err(TransitionError::invalid(current, "cancel_confirmation"));
            }
            let mut next = current.clone();
            next.location.changed_by_user = false;
            Ok(next)
        })
    }

    /// Confirm the map position for the active map target.
    ///
    /// The coordinate is reverse geocoded and the first result is confirmed.
    /// On failure the step is left unchanged.
    pub async fn confirm_map_location(
        &self,
        coordinate: Coordinate,
    ) -> Result<LocationSelectionStep, FlowError> {
        let selection = self
            .machine
            .guard("confirm_map_location", |current| current.map_target.is_some())?;

        let geocoder = &self.geocoder;
        let candidates = retry(&self.env, self.config.geocode_retry, "reverse_geocode", || {
            geocoder.reverse_geocode(coordinate)
        })
        .await?;
        let location = candidates.into_iter().next().ok_or_else(|| {
            CollaboratorError::NotFound(format!("no address at {coordinate}"))
        })?;

        // The rider may have left map selection while geocoding; the confirm
        // guards reject that.
        match selection.map_target {
            Some(MapTarget::Pickup) => self.confirm_pickup(location),
            Some(MapTarget::Dropoff) => self.confirm_dropoff(location),
            None => Err(TransitionError::invalid(&selection, "confirm_map_location").into()),
        }
    }

    /// Leave location selection. Notifies the listener, no transition.
    pub fn cancel(&self) {
        notify(&self.listener, "cancel_set_pickup_dropoff", |listener| {
            listener.cancel_set_pickup_dropoff();
        });
    }

    /// Apply `update`, reporting a newly completed pair to the listener.
    fn apply<F>(
        &self,
        operation: &'static str,
        update: F,
    ) -> Result<LocationSelectionStep, FlowError>
    where
        F: FnOnce(&LocationSelection) -> Result<LocationSelection, TransitionError>,
    {
        let mut completed = None;
        let next = self.machine.transition(operation, |current| {
            let mut next = update(current)?;
            if let Some(PendingConfirmation::Complete { pickup, dropoff }) =
                next.location.pending_confirmation()
            {
                next.location.changed_by_user = false;
                completed = Some((pickup, dropoff));
            }
            Ok(next)
        })?;

        if let Some((pickup, dropoff)) = completed {
            tracing::info!(pickup = %pickup.title, dropoff = %dropoff.title, "locations confirmed");
            notify(&self.listener, "set", |listener| listener.set(pickup, dropoff));
        }
        Ok(next.step())
    }
}

impl<E: Environment> Flow for LocationSelectionFlow<E> {
    type State = LocationSelection;

    fn observe_state(&self) -> StateStream<LocationSelection> {
        self.machine.observe_state()
    }

    fn current_state(&self) -> LocationSelection {
        self.machine.current_state()
    }

    fn terminate(&self) {
        self.machine.terminate();
    }
}

impl<E: Environment> Drop for LocationSelectionFlow<E> {
    fn drop(&mut self) {
        self.terminate();
    }
}
