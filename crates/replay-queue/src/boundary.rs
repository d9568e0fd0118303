//! Fixed-capacity ring of episode boundary positions

use replay_core::{ReplayError, Result};

/// Absolute write position; the physical slot is `position mod capacity`
pub type Position = i64;

/// Position of the seed boundary, the slot "just before" cursor 0
pub const SEED_POSITION: Position = -1;

/// Deque of absolute boundary positions, oldest first
///
/// Storage is allocated once; pushing and dropping never reallocate.
#[derive(Debug, Clone)]
pub struct BoundaryRing {
    positions: Box<[Position]>,
    head: usize,
    len: usize,
}

impl BoundaryRing {
    /// Create a ring for a memory of `capacity` slots, holding only the seed boundary
    #[must_use]
    pub fn seeded(capacity: usize) -> Self {
        let mut positions = vec![0; capacity + 1].into_boxed_slice();
        positions[0] = SEED_POSITION;
        Self {
            positions,
            head: 0,
            len: 1,
        }
    }

    /// Number of boundaries held
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no boundary is held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of boundaries
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.positions.len()
    }

    /// Boundaries older than the newest one
    #[must_use]
    pub fn episode_count(&self) -> usize {
        self.len.saturating_sub(1)
    }

    /// Boundary `index`, counted from the oldest
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Position> {
        (index < self.len).then(|| self.positions[(self.head + index) % self.positions.len()])
    }

    /// Most recent boundary
    #[must_use]
    pub fn newest(&self) -> Option<Position> {
        self.len.checked_sub(1).and_then(|last| self.get(last))
    }

    /// Append a boundary more recent than every held one
    pub fn push_newest(&mut self, position: Position) -> Result<()> {
        if self.len == self.positions.len() {
            return Err(ReplayError::ConsistencyFault(format!(
                "boundary ring full ({} entries)",
                self.len
            )));
        }
        if let Some(newest) = self.newest() {
            if position <= newest {
                return Err(ReplayError::ConsistencyFault(format!(
                    "boundary {position} is not more recent than {newest}"
                )));
            }
        }
        let tail = (self.head + self.len) % self.positions.len();
        self.positions[tail] = position;
        self.len += 1;
        Ok(())
    }

    /// Remove and return the most recent boundary
    pub fn pop_newest(&mut self) -> Option<Position> {
        let newest = self.newest()?;
        self.len -= 1;
        Some(newest)
    }

    /// Forget the `count` oldest boundaries
    pub fn drop_oldest(&mut self, count: usize) -> Result<()> {
        if count > self.len {
            return Err(ReplayError::ConsistencyFault(format!(
                "cannot evict {count} episodes, only {} boundaries resident",
                self.len
            )));
        }
        self.head = (self.head + count) % self.positions.len();
        self.len -= count;
        Ok(())
    }

    /// Boundaries from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.len).map(move |i| self.positions[(self.head + i) % self.positions.len()])
    }
}
