//! Generic state machine primitive.
//!
//! A [`StateMachine`] owns exactly one state value and a set of subscribers.
//! Every mutation goes through [`StateMachine::transition`], which runs a pure
//! update closure against the current state while holding the machine's single
//! serialization point. Subscribing happens under the same lock, so a new
//! subscriber receives the current state followed by every later state, with
//! nothing skipped and nothing delivered twice.
//!
//! ```text
//!   transition(op, |s| ..)          observe_state()
//!          │                              │
//!          ▼                              ▼
//!   ┌──────────────────── lock ─────────────────────┐
//!   │ state ──update──> next     replay current     │
//!   │ broadcast next to all      register receiver  │
//!   └───────────────────────────────────────────────┘
//! ```
//!
//! The lock is never held across an `.await`; update closures are synchronous
//! and must not call back into the same machine.

#![allow(clippy::disallowed_types, reason = "Synchronous critical section, never held across an await")]

use std::{
    fmt, iter,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
};

use futures::Stream;
use tokio::sync::mpsc;

use crate::error::TransitionError;

/// A single serialized state cell with replay-latest broadcast.
///
/// Cloning produces another handle to the same cell; flows hand clones to
/// their background tasks so collaborator outcomes re-enter through the same
/// serialization point as user actions.
pub struct StateMachine<S> {
    /// Machine name used in log output.
    name: &'static str,
    cell: Arc<Mutex<Cell<S>>>,
}

struct Cell<S> {
    state: S,
    subscribers: Vec<mpsc::UnboundedSender<S>>,
    terminated: bool,
}

impl<S> Clone for StateMachine<S> {
    fn clone(&self) -> Self {
        Self { name: self.name, cell: Arc::clone(&self.cell) }
    }
}

impl<S> StateMachine<S> {
    fn lock(&self) -> MutexGuard<'_, Cell<S>> {
        // A panicking update closure leaves the previous state in place, so the
        // cell is still consistent after poisoning.
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Name given at construction.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true once [`StateMachine::terminate`] has been called.
    pub fn is_terminated(&self) -> bool {
        self.lock().terminated
    }

    /// Number of live subscribers. Dropped streams are pruned first.
    pub fn subscriber_count(&self) -> usize {
        let mut cell = self.lock();
        cell.subscribers.retain(|tx| !tx.is_closed());
        cell.subscribers.len()
    }

    /// Tear the machine down.
    ///
    /// Every subscriber stream completes after delivering what was already
    /// broadcast, and all later transitions fail with
    /// [`TransitionError::Terminated`]. The current state is kept as is.
    pub fn terminate(&self) {
        let mut cell = self.lock();
        cell.terminated = true;
        cell.subscribers.clear();
    }
}

impl<S> StateMachine<S>
where
    S: Clone + fmt::Debug,
{
    /// Create a machine whose current state is `initial`.
    pub fn new(name: &'static str, initial: S) -> Self {
        let cell = Cell { state: initial, subscribers: Vec::new(), terminated: false };
        Self { name, cell: Arc::new(Mutex::new(cell)) }
    }

    /// Snapshot of the latest applied state.
    pub fn current_state(&self) -> S {
        self.lock().state.clone()
    }

    /// Subscribe to state changes.
    ///
    /// The stream yields the current state immediately, then every applied
    /// state in application order. Subscribing to a terminated machine yields
    /// the final state and then ends.
    pub fn observe_state(&self) -> StateStream<S> {
        let (tx, receiver) = mpsc::unbounded_channel();
        let mut cell = self.lock();

        // The receiver is alive, so the replay cannot fail.
        let _ = tx.send(cell.state.clone());
        if !cell.terminated {
            cell.subscribers.push(tx);
        }

        StateStream { receiver }
    }

    /// Apply `update` to the current state.
    ///
    /// The closure runs exactly once, under the serialization point. If it
    /// fails the state is unchanged and nothing is broadcast. Otherwise the
    /// returned state replaces the current one, is broadcast to every
    /// subscriber, and is returned to the caller.
    pub fn transition<F>(&self, operation: &'static str, update: F) -> Result<S, TransitionError>
    where
        F: FnOnce(&S) -> Result<S, TransitionError>,
    {
        let mut cell = self.lock();
        if cell.terminated {
            return Err(TransitionError::Terminated { operation });
        }

        let next = match update(&cell.state) {
            Ok(next) => next,
            Err(error) => {
                tracing::warn!(machine = self.name, operation, %error, "transition rejected");
                return Err(error);
            },
        };

        tracing::debug!(machine = self.name, operation, state = ?next, "transition applied");
        cell.state = next.clone();
        cell.subscribers.retain(|tx| tx.send(next.clone()).is_ok());
        Ok(next)
    }

    /// Check a precondition without changing or re-emitting state.
    ///
    /// Used by operations that are only valid in some states but leave the
    /// state as it is. Returns the current state when `predicate` holds.
    pub fn guard<P>(&self, operation: &'static str, predicate: P) -> Result<S, TransitionError>
    where
        P: FnOnce(&S) -> bool,
    {
        let cell = self.lock();
        if cell.terminated {
            return Err(TransitionError::Terminated { operation });
        }

        if predicate(&cell.state) {
            Ok(cell.state.clone())
        } else {
            let error = TransitionError::invalid(&cell.state, operation);
            tracing::warn!(machine = self.name, operation, %error, "guard rejected");
            Err(error)
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for StateMachine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self.lock();
        f.debug_struct("StateMachine")
            .field("name", &self.name)
            .field("state", &cell.state)
            .field("subscribers", &cell.subscribers.len())
            .field("terminated", &cell.terminated)
            .finish()
    }
}

/// Hot stream of states from one [`StateMachine`].
///
/// Dropping the stream unsubscribes it.
#[derive(Debug)]
pub struct StateStream<S> {
    receiver: mpsc::UnboundedReceiver<S>,
}

impl<S> Unpin for StateStream<S> {}

impl<S> StateStream<S> {
    /// Wait for the next state. `None` once the machine is terminated and
    /// everything broadcast before that has been consumed.
    pub async fn next_state(&mut self) -> Option<S> {
        self.receiver.recv().await
    }

    /// Next state if one has already been broadcast.
    pub fn try_next_state(&mut self) -> Option<S> {
        self.receiver.try_recv().ok()
    }

    /// All states broadcast so far and not yet consumed, in order.
    pub fn drain(&mut self) -> Vec<S> {
        iter::from_fn(|| self.try_next_state()).collect()
    }
}

impl<S> Stream for StateStream<S> {
    type Item = S;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Door {
        Open,
        Closed,
        Locked,
    }

    fn close(door: &Door) -> Result<Door, TransitionError> {
        match door {
            Door::Open => Ok(Door::Closed),
            other => Err(TransitionError::invalid(other, "close")),
        }
    }

    #[test]
    fn new_subscriber_receives_current_state_first() {
        let machine = StateMachine::new("door", Door::Open);
        let mut states = machine.observe_state();

        assert_eq!(states.drain(), vec![Door::Open]);
    }

    #[test]
    fn late_subscriber_replays_latest_then_follows() {
        let machine = StateMachine::new("door", Door::Open);
        machine.transition("close", close).unwrap();

        let mut states = machine.observe_state();
        machine.transition("lock", |_| Ok(Door::Locked)).unwrap();

        assert_eq!(states.drain(), vec![Door::Closed, Door::Locked]);
    }

    #[test]
    fn rejected_transition_keeps_state_and_emits_nothing() {
        let machine = StateMachine::new("door", Door::Locked);
        let mut states = machine.observe_state();

        let err = machine.transition("close", close).unwrap_err();

        assert!(err.is_invalid_transition());
        assert_eq!(machine.current_state(), Door::Locked);
        assert_eq!(states.drain(), vec![Door::Locked]);
    }

    #[test]
    fn every_applied_transition_is_emitted_even_if_equal() {
        let machine = StateMachine::new("door", Door::Open);
        let mut states = machine.observe_state();

        machine.transition("noop", |s| Ok(*s)).unwrap();
        machine.transition("noop", |s| Ok(*s)).unwrap();

        assert_eq!(states.drain(), vec![Door::Open, Door::Open, Door::Open]);
    }

    #[test]
    fn guard_does_not_emit() {
        let machine = StateMachine::new("door", Door::Closed);
        let mut states = machine.observe_state();

        assert_eq!(machine.guard("knock", |s| *s == Door::Closed), Ok(Door::Closed));
        assert!(machine.guard("knock", |s| *s == Door::Open).unwrap_err().is_invalid_transition());
        assert_eq!(states.drain(), vec![Door::Closed]);
    }

    #[tokio::test]
    async fn terminate_completes_streams_and_rejects_transitions() {
        let machine = StateMachine::new("door", Door::Open);
        let mut states = machine.observe_state();
        machine.transition("close", close).unwrap();

        machine.terminate();

        assert_eq!(states.next_state().await, Some(Door::Open));
        assert_eq!(states.next_state().await, Some(Door::Closed));
        assert_eq!(states.next_state().await, None);
        assert_eq!(
            machine.transition("lock", |_| Ok(Door::Locked)),
            Err(TransitionError::Terminated { operation: "lock" })
        );
        assert_eq!(machine.current_state(), Door::Closed);
    }

    #[test]
    fn subscribing_after_terminate_yields_final_state_only() {
        let machine = StateMachine::new("door", Door::Locked);
        machine.terminate();

        let mut states = machine.observe_state();

        assert_eq!(states.drain(), vec![Door::Locked]);
        assert_eq!(machine.subscriber_count(), 0);
    }

    #[test]
    fn dropped_streams_are_pruned() {
        let machine = StateMachine::new("door", Door::Open);
        let kept = machine.observe_state();
        drop(machine.observe_state());

        assert_eq!(machine.subscriber_count(), 1);
        drop(kept);
        assert_eq!(machine.subscriber_count(), 0);
    }

    #[test]
    fn concurrent_transitions_are_serialized() {
        let machine = StateMachine::new("counter", 0u32);
        let mut states = machine.observe_state();

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let machine = machine.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        machine.transition("increment", |n| Ok(n + 1)).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let observed = states.drain();
        assert_eq!(machine.current_state(), 800);
        assert_eq!(observed, (0..=800).collect::<Vec<_>>());
    }
}
