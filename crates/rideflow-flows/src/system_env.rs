//! Production Environment implementation.
//!
//! `SystemEnv` runs flows on the ambient Tokio runtime with the real clock.
//! Behavior is non-deterministic; simulation tests use the harness `SimEnv`
//! instead.

use std::{future::Future, time::Duration};

use rideflow_core::Environment;
use tokio::task::AbortHandle;

/// Production environment using system time and the ambient Tokio runtime.
///
/// # Panics
///
/// `spawn` panics when called outside a Tokio runtime. Flows only spawn from
/// mutators that trigger collaborator calls, so the coordinator driving them
/// must run inside one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    #[allow(clippy::disallowed_methods)]
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::disallowed_methods)]
    fn spawn<F>(&self, task: F) -> AbortHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(task).abort_handle()
    }
}
