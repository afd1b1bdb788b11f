//! Recording listener.

#![allow(clippy::disallowed_types, reason = "Event log is only touched synchronously")]

use std::sync::{Arc, Mutex, PoisonError, Weak};

use rideflow_core::{NamedLocation, TaskId, TripId};
use rideflow_flows::{
    DrivingListener, LocationSelectionListener, OnTripListener, PreTripListener,
};

/// Notification received by a [`RecordingListener`].
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    /// `PreTripListener::on_trip_created`
    TripCreated(TripId),
    /// `PreTripListener::cancel_pre_trip`
    CancelPreTrip,
    /// `LocationSelectionListener::set`
    Set {
        /// Reported pickup
        pickup: NamedLocation,
        /// Reported dropoff
        dropoff: NamedLocation,
    },
    /// `LocationSelectionListener::cancel_set_pickup_dropoff`
    CancelSetPickupDropoff,
    /// `OnTripListener::trip_finished`
    TripFinished,
    /// `DrivingListener::arrival_confirmed`
    ArrivalConfirmed(TaskId),
    /// `DrivingListener::did_go_offline`
    DidGoOffline,
}

/// Listener implementing every listener trait and logging what it hears.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
}

impl RecordingListener {
    /// Shared listener, ready to be downgraded into a flow.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Everything heard so far, in order.
    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&ListenerEvent) -> bool) -> usize {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.iter().filter(|&event| predicate(event)).count()
    }

    /// Trip ids reported through `on_trip_created`.
    pub fn created_trips(&self) -> Vec<TripId> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ListenerEvent::TripCreated(trip_id) => Some(trip_id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: ListenerEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

/// Weak handle as a [`PreTripListener`].
pub fn pre_trip_listener(listener: &Arc<RecordingListener>) -> Weak<dyn PreTripListener> {
    Arc::<RecordingListener>::downgrade(listener)
}

/// Weak handle as a [`LocationSelectionListener`].
pub fn location_listener(
    listener: &Arc<RecordingListener>,
) -> Weak<dyn LocationSelectionListener> {
    Arc::<RecordingListener>::downgrade(listener)
}

/// Weak handle as an [`OnTripListener`].
pub fn on_trip_listener(listener: &Arc<RecordingListener>) -> Weak<dyn OnTripListener> {
    Arc::<RecordingListener>::downgrade(listener)
}

/// Weak handle as a [`DrivingListener`].
pub fn driving_listener(listener: &Arc<RecordingListener>) -> Weak<dyn DrivingListener> {
    Arc::<RecordingListener>::downgrade(listener)
}

impl PreTripListener for RecordingListener {
    fn on_trip_created(&self, trip_id: TripId) {
        self.record(ListenerEvent::TripCreated(trip_id));
    }

    fn cancel_pre_trip(&self) {
        self.record(ListenerEvent::CancelPreTrip);
    }
}

impl LocationSelectionListener for RecordingListener {
    fn set(&self, pickup: NamedLocation, dropoff: NamedLocation) {
        self.record(ListenerEvent::Set { pickup, dropoff });
    }

    fn cancel_set_pickup_dropoff(&self) {
        self.record(ListenerEvent::CancelSetPickupDropoff);
    }
}

impl OnTripListener for RecordingListener {
    fn trip_finished(&self) {
        self.record(ListenerEvent::TripFinished);
    }
}

impl DrivingListener for RecordingListener {
    fn arrival_confirmed(&self, task_id: TaskId) {
        self.record(ListenerEvent::ArrivalConfirmed(task_id));
    }

    fn did_go_offline(&self) {
        self.record(ListenerEvent::DidGoOffline);
    }
}
