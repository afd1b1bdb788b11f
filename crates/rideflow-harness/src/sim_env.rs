//! Simulation environment on the Tokio clock.
//!
//! Under `#[tokio::test(start_paused = true)]` the clock only moves when every
//! task is idle, so flows, collaborators and retry delays run in virtual time
//! and a test observes the same interleaving on every run. Randomness comes
//! from a seeded `ChaCha8` generator shared by all clones.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rideflow_core::Environment;
use tokio::task::AbortHandle;

/// Time a test waits for spawned collaborator calls to resolve.
pub const SETTLE: Duration = Duration::from_millis(1);

/// Deterministic simulation environment.
#[derive(Clone)]
pub struct SimEnv {
    seed: u64,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Create an environment with a fixed seed.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed, rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))) }
    }

    /// Seed this environment was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Derive a seed for a component (chaotic collaborator, scenario).
    pub fn fork_seed(&self) -> u64 {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).r#gen()
    }

    /// True with probability `p` (clamped to `0.0..=1.0`).
    pub fn chance(&self, p: f64) -> bool {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).gen_bool(p.clamp(0.0, 1.0))
    }

    /// Let every spawned task run until it blocks on time.
    ///
    /// Collaborators without latency resolve within one settle.
    pub async fn settle(&self) {
        self.sleep(SETTLE).await;
    }

    /// Advance virtual time by `duration`, running everything due meanwhile.
    pub async fn advance(&self, duration: Duration) {
        self.sleep(duration).await;
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::with_seed(42)
    }
}

impl std::fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEnv").field("seed", &self.seed).finish_non_exhaustive()
    }
}

impl Environment for SimEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
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
