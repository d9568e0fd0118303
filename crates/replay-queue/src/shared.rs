//! Thread-safe handle to a queue: one writer, many readers

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use replay_core::{QueueConfig, Result, Timesteps, Value, ValuesSpec};

use crate::queue::{Queue, QueueStats};
use crate::window::WindowBatch;

/// Cloneable handle sharing one [`Queue`] between a producer and trainers
///
/// `enqueue` holds the write lock for the whole operation, so readers only
/// ever observe a queue between two complete writes.
#[derive(Debug, Clone)]
pub struct SharedQueue {
    inner: Arc<RwLock<Queue>>,
}

impl SharedQueue {
    /// Create a shared queue
    pub fn new(config: &QueueConfig, spec: ValuesSpec) -> Result<Self> {
        Ok(Self::from(Queue::new(config, spec)?))
    }

    /// Append a batch of timesteps
    pub fn enqueue(&self, timesteps: &Timesteps) -> Result<()> {
        self.inner.write().enqueue(timesteps)
    }

    /// Read fields at arbitrary slots
    pub fn retrieve(&self, indices: &[usize], fields: &[&str]) -> Result<IndexMap<String, Value>> {
        self.inner.read().retrieve(indices, fields)
    }

    /// Backward windows, see [`Queue::predecessors`]
    pub fn predecessors(
        &self,
        indices: &[usize],
        horizon: usize,
        sequence_fields: &[&str],
        initial_fields: &[&str],
    ) -> Result<WindowBatch> {
        self.inner
            .read()
            .predecessors(indices, horizon, sequence_fields, initial_fields)
    }

    /// Forward windows, see [`Queue::successors`]
    pub fn successors(
        &self,
        indices: &[usize],
        horizon: usize,
        sequence_fields: &[&str],
        final_fields: &[&str],
    ) -> Result<WindowBatch> {
        self.inner
            .read()
            .successors(indices, horizon, sequence_fields, final_fields)
    }

    /// Summary of the current state
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        self.inner.read().stats()
    }

    /// Run `f` against the queue under the read lock
    pub fn with_queue<R>(&self, f: impl FnOnce(&Queue) -> R) -> R {
        f(&self.inner.read())
    }
}

impl From<Queue> for SharedQueue {
    fn from(queue: Queue) -> Self {
        Self {
            inner: Arc::new(RwLock::new(queue)),
        }
    }
}
