//! Listener interfaces from flows to their parent coordinators.
//!
//! Flows hold listeners as [`Weak`] references. A parent that has gone away
//! turns every notification into a logged no-op.

use std::sync::Weak;

use rideflow_core::{NamedLocation, TaskId, TripId};

/// Parent of a [`crate::PreTripFlow`].
pub trait PreTripListener: Send + Sync {
    /// A trip was created. Fired at most once per flow.
    fn on_trip_created(&self, trip_id: TripId);

    /// The rider abandoned the trip request.
    fn cancel_pre_trip(&self);
}

/// Parent of a [`crate::LocationSelectionFlow`].
pub trait LocationSelectionListener: Send + Sync {
    /// Both locations are confirmed.
    fn set(&self, pickup: NamedLocation, dropoff: NamedLocation);

    /// The rider left location selection without choosing.
    fn cancel_set_pickup_dropoff(&self);
}

/// Parent of a [`crate::OnTripEditFlow`].
pub trait OnTripListener: Send + Sync {
    /// The trip ended.
    fn trip_finished(&self);
}

/// Parent of a [`crate::DrivingPhaseFlow`].
pub trait DrivingListener: Send + Sync {
    /// The driver confirmed arrival at the waypoint for `task_id`.
    fn arrival_confirmed(&self, task_id: TaskId);

    /// The driver went offline.
    fn did_go_offline(&self);
}

/// Deliver a notification if the listener is still alive.
pub(crate) fn notify<L, F>(listener: &Weak<L>, event: &'static str, deliver: F)
where
    L: ?Sized,
    F: FnOnce(&L),
{
    match listener.upgrade() {
        Some(listener) => {
            tracing::debug!(event, "notifying listener");
            deliver(&listener);
        },
        None => tracing::warn!(event, "listener dropped, notification skipped"),
    }
}
