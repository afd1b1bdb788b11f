//! Environment abstraction for deterministic testing.
//!
//! Decouples flow logic from the clock and the task scheduler. Production code
//! runs on the real Tokio runtime; simulation runs on a paused Tokio clock so
//! tests can drive virtual time and assert exact event ordering.

use std::{future::Future, time::Duration};

use tokio::task::AbortHandle;

/// Abstract environment providing time and task scheduling.
///
/// # Invariants
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - a future passed to `spawn()` starts running without the caller awaiting
///   anything, and can be cancelled through the returned handle
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, while simulation
    /// environments use the Tokio clock, which can be paused and advanced.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only used between retry attempts with a fixed delay; flow logic never
    /// sleeps.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Schedules a background task, typically a collaborator call whose
    /// outcome is fed back into a state machine.
    ///
    /// Aborting the returned handle cancels the task at its next suspension
    /// point.
    fn spawn<F>(&self, task: F) -> AbortHandle
    where
        F: Future<Output = ()> + Send + 'static;
}
