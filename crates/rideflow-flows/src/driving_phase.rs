//! Driver navigation toward one waypoint.
//!
//! ```text
//!   DrivePending ──start_navigation──> Navigating ──finished_navigation(c)──┐
//!                                          ^                                 │
//!                                          │                                 v
//!                   start_navigation (only if c) ─── ConfirmingArrival { show_back_to_navigation: c }
//! ```
//!
//! `arrival_confirmed` is only accepted while confirming arrival and leaves
//! the state untouched; the confirmation itself is owned by a nested
//! [`crate::ConfirmationFlow`].

use std::sync::{Arc, Weak};

use rideflow_core::{
    DriverVehicleInteractor, Environment, StateMachine, StateStream, TaskSet, TransitionError,
    VehicleId, VehicleStatus, Waypoint, retry,
};
use serde::{Deserialize, Serialize};

use crate::{
    config::DrivingPhaseConfig,
    error::FlowError,
    flow::Flow,
    listener::{DrivingListener, notify},
};

/// State of a [`DrivingPhaseFlow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrivingPhase {
    /// Waypoint assigned, navigation not started.
    DrivePending,
    /// Turn-by-turn navigation running.
    Navigating,
    /// Navigation ended; driver confirms arrival.
    ConfirmingArrival {
        /// Navigation was cancelled rather than completed, so the driver may
        /// go back to it.
        show_back_to_navigation: bool,
    },
}

/// Driver's progress toward a single destination waypoint.
pub struct DrivingPhaseFlow<E: Environment> {
    env: E,
    config: DrivingPhaseConfig,
    vehicle_id: VehicleId,
    destination: Waypoint,
    machine: StateMachine<DrivingPhase>,
    vehicles: Arc<dyn DriverVehicleInteractor>,
    listener: Weak<dyn DrivingListener>,
    tasks: TaskSet,
}

impl<E: Environment> DrivingPhaseFlow<E> {
    /// Create a flow in `DrivePending` for `destination`.
    pub fn new(
        env: E,
        config: DrivingPhaseConfig,
        vehicle_id: VehicleId,
        destination: Waypoint,
        vehicles: Arc<dyn DriverVehicleInteractor>,
        listener: Weak<dyn DrivingListener>,
    ) -> Self {
        let machine = StateMachine::new("driving_phase", DrivingPhase::DrivePending);
        Self {
            env,
            config,
            vehicle_id,
            destination,
            machine,
            vehicles,
            listener,
            tasks: TaskSet::new(),
        }
    }

    /// Waypoint being driven to.
    pub fn destination(&self) -> &Waypoint {
        &self.destination
    }

    /// Start or resume navigation.
    ///
    /// Resuming is only possible after a cancelled navigation.
    pub fn start_navigation(&self) -> Result<DrivingPhase, FlowError> {
        let next = self.machine.transition("start_navigation", |current| match current {
            DrivingPhase::DrivePending
            | DrivingPhase::ConfirmingArrival { show_back_to_navigation: true } => {
                Ok(DrivingPhase::Navigating)
            },
            other => Err(TransitionError::invalid(other, "start_navigation")),
        })?;
        Ok(next)
    }

    /// Navigation ended, by arriving or by the driver cancelling it.
    pub fn finished_navigation(&self, cancelled: bool) -> Result<DrivingPhase, FlowError> {
        let next = self.machine.transition("finished_navigation", |current| match current {
            DrivingPhase::Navigating => {
                Ok(DrivingPhase::ConfirmingArrival { show_back_to_navigation: cancelled })
            },
            other => Err(TransitionError::invalid(other, "finished_navigation")),
        })?;
        Ok(next)
    }

    /// Arrival at the destination was confirmed.
    pub fn arrival_confirmed(&self) -> Result<DrivingPhase, FlowError> {
        let state = self.machine.guard("arrival_confirmed", |current| {
            matches!(current, DrivingPhase::ConfirmingArrival { .. })
        })?;

        let task_id = self.destination.task_id.clone();
        tracing::info!(%task_id, "arrival confirmed");
        notify(&self.listener, "arrival_confirmed", |listener| {
            listener.arrival_confirmed(task_id);
        });
        Ok(state)
    }

    /// Driver goes offline. Valid from every state.
    ///
    /// The offline status is pushed to the vehicle service in the background
    /// and the listener hears `did_go_offline` once that settles, whether or
    /// not the push succeeded.
    pub fn go_offline(&self) -> Result<(), FlowError> {
        self.machine.guard("go_offline", |_| true)?;

        let env = self.env.clone();
        let budget = self.config.vehicle_sync_retry;
        let vehicles = Arc::clone(&self.vehicles);
        let vehicle_id = self.vehicle_id.clone();
        let listener = Weak::clone(&self.listener);

        self.tasks.spawn(&self.env, async move {
            let synced = retry(&env, budget, "sync_vehicle_state", || {
                vehicles.sync_vehicle_state(&vehicle_id, VehicleStatus::Offline)
            })
            .await;
            if let Err(error) = synced {
                tracing::warn!(%vehicle_id, %error, "offline status not synced");
            }
            notify(&listener, "did_go_offline", |listener| listener.did_go_offline());
        });
        Ok(())
    }
}

impl<E: Environment> Flow for DrivingPhaseFlow<E> {
    type State = DrivingPhase;

    fn observe_state(&self) -> StateStream<DrivingPhase> {
        self.machine.observe_state()
    }

    fn current_state(&self) -> DrivingPhase {
        self.machine.current_state()
    }

    fn terminate(&self) {
        self.tasks.abort_all();
        self.machine.terminate();
    }
}

impl<E: Environment> Drop for DrivingPhaseFlow<E> {
    fn drop(&mut self) {
        self.terminate();
    }
}
