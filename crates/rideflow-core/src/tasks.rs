//! Tracking of in-flight background tasks.
//!
//! Flows spawn one task per triggered collaborator call. Tearing a flow down
//! aborts whatever is still running so late results can no longer reach the
//! state machine or the listener.

#![allow(clippy::disallowed_types, reason = "Handle list is only touched synchronously")]

use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::task::AbortHandle;

use crate::env::Environment;

/// Set of abortable background tasks owned by one flow.
#[derive(Debug, Clone, Default)]
pub struct TaskSet {
    handles: Arc<Mutex<Vec<AbortHandle>>>,
}

impl TaskSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` through `env` and track it.
    pub fn spawn<E, F>(&self, env: &E, task: F)
    where
        E: Environment,
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = env.spawn(task);
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Number of tracked tasks that have not finished yet.
    pub fn active(&self) -> usize {
        let handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Abort every tracked task.
    pub fn abort_all(&self) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in handles.drain(..) {
            handle.abort();
        }
    }
}
