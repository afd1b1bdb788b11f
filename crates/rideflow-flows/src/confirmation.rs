//! Arrival and pickup confirmation.
//!
//! A four-state protocol shared by the arrival and pickup screens. Entering
//! `Confirming` completes every step of the waypoint in order; the first step
//! that exhausts its retry budget fails the whole attempt, and the next
//! `confirm()` starts again from the first step.

use std::sync::Arc;

use rideflow_core::{
    DriverVehicleInteractor, Environment, StateMachine, StateStream, StepId, TaskId, TaskSet,
    TransitionError, VehicleId, Waypoint, retry,
};
use serde::{Deserialize, Serialize};

use crate::{config::ConfirmationConfig, error::FlowError, flow::Flow};

/// What the driver confirms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfirmationKind {
    /// Arrival at a drive destination.
    Arrival,
    /// Rider picked up.
    Pickup,
}

/// State of a [`ConfirmationFlow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfirmationState {
    /// Nothing sent yet.
    Unconfirmed,
    /// Steps being completed.
    Confirming,
    /// Every step completed. Terminal.
    Confirmed,
    /// A step could not be completed. `confirm()` retries.
    Failed,
}

/// Confirmation of one waypoint's steps.
pub struct ConfirmationFlow<E: Environment> {
    env: E,
    config: ConfirmationConfig,
    kind: ConfirmationKind,
    vehicle_id: VehicleId,
    task_id: TaskId,
    step_ids: Arc<[StepId]>,
    machine: StateMachine<ConfirmationState>,
    vehicles: Arc<dyn DriverVehicleInteractor>,
    tasks: TaskSet,
}

impl<E: Environment> ConfirmationFlow<E> {
    /// Create a flow in `Unconfirmed` for the steps of `waypoint`.
    pub fn new(
        env: E,
        config: ConfirmationConfig,
        kind: ConfirmationKind,
        vehicle_id: VehicleId,
        waypoint: &Waypoint,
        vehicles: Arc<dyn DriverVehicleInteractor>,
    ) -> Self {
        let machine = StateMachine::new(
            match kind {
                ConfirmationKind::Arrival => "arrival_confirmation",
                ConfirmationKind::Pickup => "pickup_confirmation",
            },
            ConfirmationState::Unconfirmed,
        );
        Self {
            env,
            config,
            kind,
            vehicle_id,
            task_id: waypoint.task_id.clone(),
            step_ids: waypoint.step_ids.iter().cloned().collect(),
            machine,
            vehicles,
            tasks: TaskSet::new(),
        }
    }

    /// What this flow confirms.
    pub fn kind(&self) -> ConfirmationKind {
        self.kind
    }

    /// Start confirming.
    ///
    /// Only has an effect from `Unconfirmed` or `Failed`. From `Confirming`
    /// or `Confirmed` the call is a silent no-op that emits nothing and
    /// returns the current state.
    pub fn confirm(&self) -> Result<ConfirmationState, FlowError> {
        let current = self.machine.current_state();
        if matches!(current, ConfirmationState::Confirming | ConfirmationState::Confirmed) {
            tracing::debug!(kind = ?self.kind, state = ?current, "confirm ignored");
            return Ok(current);
        }

        let next = match self.machine.transition("confirm", |current| match current {
            ConfirmationState::Unconfirmed | ConfirmationState::Failed => {
                Ok(ConfirmationState::Confirming)
            },
            other => Err(TransitionError::invalid(other, "confirm")),
        }) {
            Ok(next) => next,
            // Another caller started confirming between the check and the
            // transition.
            Err(error) if error.is_invalid_transition() => {
                return Ok(self.machine.current_state());
            },
            Err(error) => return Err(error.into()),
        };

        self.complete_steps();
        Ok(next)
    }

    fn complete_steps(&self) {
        let env = self.env.clone();
        let budget = self.config.step_retry;
        let machine = self.machine.clone();
        let vehicles = Arc::clone(&self.vehicles);
        let vehicle_id = self.vehicle_id.clone();
        let task_id = self.task_id.clone();
        let step_ids = Arc::clone(&self.step_ids);
        let kind = self.kind;

        self.tasks.spawn(&self.env, async move {
            for step_id in step_ids.iter() {
                let completed = retry(&env, budget, "complete_step", || {
                    vehicles.complete_step(&vehicle_id, &task_id, step_id)
                })
                .await;

                if let Err(error) = completed {
                    tracing::info!(?kind, %task_id, %step_id, %error, "confirmation failed");
                    settle(&machine, ConfirmationState::Failed);
                    return;
                }
                tracing::debug!(?kind, %task_id, %step_id, "step completed");
            }

            tracing::info!(?kind, %task_id, "confirmed");
            settle(&machine, ConfirmationState::Confirmed);
        });
    }
}

/// Leave `Confirming` for `outcome`.
fn settle(machine: &StateMachine<ConfirmationState>, outcome: ConfirmationState) {
    let settled = machine.transition("settle_confirmation", |current| match current {
        ConfirmationState::Confirming => Ok(outcome),
        other => Err(TransitionError::invalid(other, "settle_confirmation")),
    });
    if settled.is_err() {
        tracing::debug!(?outcome, "stale confirmation outcome ignored");
    }
}

impl<E: Environment> Flow for ConfirmationFlow<E> {
    type State = ConfirmationState;

    fn observe_state(&self) -> StateStream<ConfirmationState> {
        self.machine.observe_state()
    }

    fn current_state(&self) -> ConfirmationState {
        self.machine.current_state()
    }

    fn terminate(&self) {
        self.tasks.abort_all();
        self.machine.terminate();
    }
}

impl<E: Environment> Drop for ConfirmationFlow<E> {
    fn drop(&mut self) {
        self.terminate();
    }
}
