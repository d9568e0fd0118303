//! Fixed-capacity episodic replay queue

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use replay_core::{QueueConfig, ReplayError, Result, Terminal, Timesteps, Value, ValuesSpec};

use crate::boundary::{BoundaryRing, Position};
use crate::store::FieldStore;
use crate::window::{Direction, WindowBatch, Walker};

/// Point-in-time summary of a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Number of slots
    pub capacity: usize,
    /// Total timesteps ever written
    pub buffer_index: Position,
    /// Slots holding written timesteps
    pub occupancy: usize,
    /// Boundaries resident before the newest one
    pub episode_count: usize,
    /// Whether a consistency fault disabled the queue
    pub poisoned: bool,
}

/// Ring buffer of the most recent `capacity` timesteps
///
/// The newest written slot always carries a nonzero terminal flag: a genuine
/// terminal if the last batch ended its episode, [`Terminal::Pending`]
/// otherwise. Every nonzero slot is listed, oldest first, in the boundary ring,
/// so the number of nonzero slots is always `episode_count + 1`.
#[derive(Debug, Clone)]
pub struct Queue {
    store: FieldStore,
    boundaries: BoundaryRing,
    buffer_index: Position,
    poisoned: bool,
}

impl Queue {
    /// Create a queue storing the fields of `spec`
    pub fn new(config: &QueueConfig, spec: ValuesSpec) -> Result<Self> {
        let capacity = config.resolve_capacity()?;
        let store = FieldStore::new(spec, capacity)?;
        info!(capacity, fields = store.spec().len(), "created replay queue");
        Ok(Self {
            store,
            boundaries: BoundaryRing::seeded(capacity),
            buffer_index: 0,
            poisoned: false,
        })
    }

    /// Number of slots
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Values specification of the stored fields
    #[must_use]
    pub fn spec(&self) -> &ValuesSpec {
        self.store.spec()
    }

    /// Absolute write cursor (total timesteps ever written)
    #[must_use]
    pub fn buffer_index(&self) -> Position {
        self.buffer_index
    }

    /// Boundaries resident before the newest one
    #[must_use]
    pub fn episode_count(&self) -> usize {
        self.boundaries.episode_count()
    }

    /// Slots holding written timesteps
    #[must_use]
    pub fn occupancy(&self) -> usize {
        let written = usize::try_from(self.buffer_index).unwrap_or(usize::MAX);
        written.min(self.capacity())
    }

    /// Absolute boundary positions, oldest first
    #[must_use]
    pub fn terminal_indices(&self) -> Vec<Position> {
        self.boundaries.iter().collect()
    }

    /// Terminal flag of every slot
    #[must_use]
    pub fn terminal(&self) -> &[Terminal] {
        self.store.terminal()
    }

    /// Whether a consistency fault disabled the queue
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Summary of the current state
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            capacity: self.capacity(),
            buffer_index: self.buffer_index,
            occupancy: self.occupancy(),
            episode_count: self.episode_count(),
            poisoned: self.poisoned,
        }
    }

    /// Physical slot of an absolute position
    #[must_use]
    pub fn slot(&self, position: Position) -> usize {
        // rem_euclid of a positive modulus is in [0, capacity)
        position.rem_euclid(self.capacity() as Position) as usize
    }

    /// Append a batch of timesteps, evicting the oldest episodes as needed
    ///
    /// The batch must fit in the queue and may hold at most one genuine
    /// terminal, as its last element. Caller errors leave the queue untouched.
    /// A consistency fault poisons the queue.
    pub fn enqueue(&mut self, timesteps: &Timesteps) -> Result<()> {
        self.ensure_healthy()?;
        self.check_batch(timesteps)?;

        let result = self.write_batch(timesteps);
        if let Err(ref err) = result {
            self.poison(err);
        }
        result
    }

    fn check_batch(&self, timesteps: &Timesteps) -> Result<()> {
        let n = timesteps.len();
        let capacity = self.capacity();
        if n == 0 {
            return Err(ReplayError::InvalidBatchShape("batch has no timesteps".to_string()));
        }
        if n > capacity {
            return Err(ReplayError::CapacityExceeded { batch: n, capacity });
        }

        let flags = timesteps.terminal();
        if flags.contains(&Terminal::Pending) {
            return Err(ReplayError::InvalidBatchShape(
                "pending terminal flag is reserved for the queue".to_string(),
            ));
        }
        let terminals = flags.iter().filter(|flag| flag.is_boundary()).count();
        if terminals > 1 {
            return Err(ReplayError::InvalidBatchShape(format!(
                "timesteps contain {terminals} terminals, at most one allowed"
            )));
        }
        if terminals == 1 && !flags[n - 1].is_genuine() {
            return Err(ReplayError::InvalidBatchShape(
                "terminal is not the last timestep".to_string(),
            ));
        }

        self.store.validate_batch(timesteps)
    }

    fn write_batch(&mut self, timesteps: &Timesteps) -> Result<()> {
        let n = timesteps.len();

        // The previous batch's tail is no longer the newest slot
        let last = self.slot(self.buffer_index - 1);
        if self.store.terminal()[last] == Terminal::Pending {
            self.store.set_terminal(last, Terminal::No);
            match self.boundaries.pop_newest() {
                Some(position) if position == self.buffer_index - 1 => {}
                other => {
                    return Err(ReplayError::ConsistencyFault(format!(
                        "pending slot {} is not the newest boundary ({other:?})",
                        self.buffer_index - 1
                    )))
                }
            }
        }

        self.check_consistency()?;

        let slots: Vec<usize> = (0..n as Position)
            .map(|offset| self.slot(self.buffer_index + offset))
            .collect();

        let evicted = slots
            .iter()
            .filter(|&&slot| self.store.terminal()[slot].is_boundary())
            .count();
        if evicted > self.boundaries.len() {
            return Err(ReplayError::ConsistencyFault(format!(
                "batch would evict {evicted} episodes, only {} resident",
                self.boundaries.len()
            )));
        }
        self.boundaries.drop_oldest(evicted)?;

        self.store.write(&slots, timesteps)?;
        self.buffer_index += n as Position;
        self.boundaries.push_newest(self.buffer_index - 1)?;

        debug!(
            timesteps = n,
            evicted,
            ends_episode = timesteps.ends_episode(),
            episode_count = self.episode_count(),
            buffer_index = self.buffer_index,
            "enqueued timesteps"
        );
        Ok(())
    }

    /// Verify the boundary invariants against the terminal column
    ///
    /// Every nonzero slot must be listed in the boundary ring, in recency
    /// order, and every listed slot must be nonzero.
    pub fn check_consistency(&self) -> Result<()> {
        let nonzero = self.store.boundary_count();
        if nonzero != self.boundaries.len() {
            return Err(ReplayError::ConsistencyFault(format!(
                "{nonzero} boundary slots but {} boundaries recorded",
                self.boundaries.len()
            )));
        }

        let oldest_resident = self.buffer_index - self.capacity() as Position;
        let mut previous: Option<Position> = None;
        for position in self.boundaries.iter() {
            if !self.store.terminal()[self.slot(position)].is_boundary() {
                return Err(ReplayError::ConsistencyFault(format!(
                    "recorded boundary {position} has no terminal flag"
                )));
            }
            if position < oldest_resident || position >= self.buffer_index {
                return Err(ReplayError::ConsistencyFault(format!(
                    "recorded boundary {position} is outside the resident window"
                )));
            }
            if previous.is_some_and(|previous| previous >= position) {
                return Err(ReplayError::ConsistencyFault(format!(
                    "boundaries out of order at {position}"
                )));
            }
            previous = Some(position);
        }
        Ok(())
    }

    /// Read fields at arbitrary slots
    ///
    /// Indices may repeat and come in any order; they are not checked against
    /// occupancy.
    pub fn retrieve(&self, indices: &[usize], fields: &[&str]) -> Result<IndexMap<String, Value>> {
        self.ensure_healthy()?;
        self.check_indices(indices)?;
        self.gather_fields(indices, fields)
    }

    /// Windows reaching back at most `horizon` steps from each index
    ///
    /// `initial_fields` are read at the oldest slot of each window.
    pub fn predecessors(
        &self,
        indices: &[usize],
        horizon: usize,
        sequence_fields: &[&str],
        initial_fields: &[&str],
    ) -> Result<WindowBatch> {
        self.windows(Direction::Predecessors, indices, horizon, sequence_fields, initial_fields)
    }

    /// Windows reaching forward at most `horizon` steps from each index
    ///
    /// `final_fields` are read at the newest slot of each window.
    pub fn successors(
        &self,
        indices: &[usize],
        horizon: usize,
        sequence_fields: &[&str],
        final_fields: &[&str],
    ) -> Result<WindowBatch> {
        self.windows(Direction::Successors, indices, horizon, sequence_fields, final_fields)
    }

    fn windows(
        &self,
        direction: Direction,
        indices: &[usize],
        horizon: usize,
        sequence_fields: &[&str],
        boundary_fields: &[&str],
    ) -> Result<WindowBatch> {
        self.ensure_healthy()?;
        if sequence_fields.is_empty() && boundary_fields.is_empty() {
            return Err(ReplayError::InvalidArgument(
                "no sequence or boundary fields requested".to_string(),
            ));
        }
        self.check_indices(indices)?;
        if let Some(unknown) = sequence_fields
            .iter()
            .chain(boundary_fields)
            .find(|name| !self.store.contains(name))
        {
            return Err(ReplayError::UnknownField((*unknown).to_string()));
        }

        let windows = Walker::new(self.store.terminal(), self.buffer_index)
            .walk(direction, indices, horizon)?;

        let boundary_indices = match direction {
            Direction::Predecessors => windows.initial_indices(),
            Direction::Successors => windows.final_indices(),
        };
        let sequence = self.gather_fields(&windows.indices, sequence_fields)?;
        let boundary = self.gather_fields(&boundary_indices, boundary_fields)?;

        Ok(WindowBatch {
            windows,
            sequence,
            boundary,
        })
    }

    fn gather_fields(&self, indices: &[usize], fields: &[&str]) -> Result<IndexMap<String, Value>> {
        fields
            .iter()
            .map(|&name| Ok((name.to_string(), self.store.gather(name, indices)?)))
            .collect()
    }

    fn check_indices(&self, indices: &[usize]) -> Result<()> {
        match indices.iter().find(|&&index| index >= self.capacity()) {
            Some(index) => Err(ReplayError::InvalidArgument(format!(
                "index {index} out of range for capacity {}",
                self.capacity()
            ))),
            None => Ok(()),
        }
    }

    fn ensure_healthy(&self) -> Result<()> {
        if self.poisoned {
            return Err(ReplayError::ConsistencyFault(
                "queue was disabled by an earlier consistency fault".to_string(),
            ));
        }
        Ok(())
    }

    fn poison(&mut self, err: &ReplayError) {
        self.poisoned = true;
        error!(
            error = %err,
            buffer_index = self.buffer_index,
            "replay queue disabled"
        );
    }
}
