//! Bounded backward/forward walks that stop at episode boundaries

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use replay_core::{ReplayError, Result, Terminal, Value};

use crate::boundary::Position;

/// Walk direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Towards older slots
    Predecessors,
    /// Towards newer slots
    Successors,
}

/// Why a window stopped growing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The next step would have crossed an episode boundary
    Boundary,
    /// All `horizon` steps were taken
    Horizon,
}

/// Ragged windows of slot indices, one per query
///
/// Window `i` is `indices[starts[i]..starts[i] + lengths[i]]`, oldest slot
/// first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Windows {
    /// All windows, concatenated in query order
    pub indices: Vec<usize>,
    /// Offset of each window in `indices`
    pub starts: Vec<usize>,
    /// Length of each window, between 1 and `horizon + 1`
    pub lengths: Vec<usize>,
    /// Why each window stopped
    pub stops: Vec<StopReason>,
}

impl Windows {
    /// Number of windows
    #[must_use]
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    /// Whether there is no window
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Slots of window `query`, or `None` past the last window
    #[must_use]
    pub fn window(&self, query: usize) -> Option<&[usize]> {
        let (&start, &length) = self.starts.get(query).zip(self.lengths.get(query))?;
        self.indices.get(start..start + length)
    }

    /// `(start, length)` of every window
    pub fn spans(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.starts.iter().copied().zip(self.lengths.iter().copied())
    }

    /// Oldest slot of every window
    #[must_use]
    pub fn initial_indices(&self) -> Vec<usize> {
        self.starts.iter().map(|&start| self.indices[start]).collect()
    }

    /// Newest slot of every window
    #[must_use]
    pub fn final_indices(&self) -> Vec<usize> {
        self.spans()
            .map(|(start, length)| self.indices[start + length - 1])
            .collect()
    }

    fn push(&mut self, length: usize, stop: StopReason) {
        self.starts.push(self.indices.len() - length);
        self.lengths.push(length);
        self.stops.push(stop);
    }
}

/// Result of a predecessor or successor query
#[derive(Debug, Clone, PartialEq)]
pub struct WindowBatch {
    /// Walked slots
    pub windows: Windows,
    /// Requested fields at every walked slot
    pub sequence: IndexMap<String, Value>,
    /// Requested fields at the far end of each window: oldest slot for
    /// predecessors, newest slot for successors
    pub boundary: IndexMap<String, Value>,
}

/// Read-only view of the terminal column used to walk windows
pub(crate) struct Walker<'a> {
    terminal: &'a [Terminal],
    buffer_index: Position,
}

impl<'a> Walker<'a> {
    pub(crate) fn new(terminal: &'a [Terminal], buffer_index: Position) -> Self {
        Self {
            terminal,
            buffer_index,
        }
    }

    /// Distance from the newest written slot: 0 newest, `capacity - 1` oldest
    fn age(&self, slot: usize) -> usize {
        let capacity = self.terminal.len() as Position;
        // rem_euclid of a positive modulus is in [0, capacity)
        (self.buffer_index - 1 - slot as Position).rem_euclid(capacity) as usize
    }

    pub(crate) fn walk(&self, direction: Direction, starts: &[usize], horizon: usize) -> Result<Windows> {
        let mut windows = Windows {
            indices: Vec::with_capacity(starts.len()),
            starts: Vec::with_capacity(starts.len()),
            lengths: Vec::with_capacity(starts.len()),
            stops: Vec::with_capacity(starts.len()),
        };
        for &start in starts {
            let begin = windows.indices.len();
            let stop = match direction {
                Direction::Predecessors => self.predecessors_of(start, horizon, &mut windows.indices)?,
                Direction::Successors => self.successors_of(start, horizon, &mut windows.indices)?,
            };
            windows.push(windows.indices.len() - begin, stop);
        }
        trace!(
            ?direction,
            queries = starts.len(),
            horizon,
            slots = windows.indices.len(),
            "walked windows"
        );
        Ok(windows)
    }

    fn predecessors_of(&self, start: usize, horizon: usize, out: &mut Vec<usize>) -> Result<StopReason> {
        let capacity = self.terminal.len();
        let begin = out.len();
        out.push(start);

        let mut current = start;
        let mut stop = StopReason::Horizon;
        for _ in 0..horizon {
            let previous = (current + capacity - 1) % capacity;
            if self.terminal[previous].is_boundary() {
                stop = StopReason::Boundary;
                break;
            }
            if self.age(previous) != self.age(current) + 1 {
                return Err(ReplayError::ConsistencyFault(format!(
                    "predecessor walk from slot {start} passed the oldest slot"
                )));
            }
            out.push(previous);
            current = previous;
        }

        out[begin..].reverse();
        Ok(stop)
    }

    fn successors_of(&self, start: usize, horizon: usize, out: &mut Vec<usize>) -> Result<StopReason> {
        let capacity = self.terminal.len();
        out.push(start);

        let mut current = start;
        for _ in 0..horizon {
            if self.terminal[current].is_boundary() {
                return Ok(StopReason::Boundary);
            }
            if self.age(current) == 0 {
                return Err(ReplayError::ConsistencyFault(format!(
                    "successor walk from slot {start} passed the newest slot"
                )));
            }
            current = (current + 1) % capacity;
            out.push(current);
        }
        Ok(StopReason::Horizon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_core::Terminal::{No, Pending};

    // Slots 0..8 after writing [0,0,1] then [0,0,0,0]: boundaries at 2 and 6
    fn column() -> Vec<Terminal> {
        vec![No, No, Terminal::Terminal, No, No, No, Pending, Terminal::Terminal]
    }

    #[test]
    fn test_predecessors_stop_at_boundary() {
        let terminal = column();
        let walker = Walker::new(&terminal, 7);
        let windows = walker.walk(Direction::Predecessors, &[5, 3, 1], 2).unwrap();

        assert_eq!(windows.window(0), Some(&[3, 4, 5][..]));
        assert_eq!(windows.window(1), Some(&[3][..]));
        assert_eq!(windows.window(2), Some(&[0, 1][..]));
        assert_eq!(windows.starts, vec![0, 3, 4]);
        assert_eq!(windows.stops, vec![StopReason::Horizon, StopReason::Boundary, StopReason::Boundary]);
        assert_eq!(windows.initial_indices(), vec![3, 3, 0]);
    }

    #[test]
    fn test_successors_include_boundary_slot() {
        let terminal = column();
        let walker = Walker::new(&terminal, 7);
        let windows = walker.walk(Direction::Successors, &[0, 2, 4], 5).unwrap();

        assert_eq!(windows.window(0), Some(&[0, 1, 2][..]));
        assert_eq!(windows.window(1), Some(&[2][..]));
        assert_eq!(windows.window(2), Some(&[4, 5, 6][..]));
        assert_eq!(windows.final_indices(), vec![2, 2, 6]);
        assert!(windows.stops.iter().all(|&stop| stop == StopReason::Boundary));
    }

    #[test]
    fn test_zero_horizon() {
        let terminal = column();
        let walker = Walker::new(&terminal, 7);
        let windows = walker.walk(Direction::Successors, &[4, 4], 0).unwrap();
        assert_eq!(windows.indices, vec![4, 4]);
        assert_eq!(windows.lengths, vec![1, 1]);
        assert_eq!(windows.stops, vec![StopReason::Horizon; 2]);
    }

    #[test]
    fn test_walk_past_newest_slot_is_fault() {
        // The newest slot (6) is not flagged, so a forward walk runs into stale data
        let terminal = vec![No, No, Terminal::Terminal, No, No, No, No, Terminal::Terminal];
        let walker = Walker::new(&terminal, 7);
        let err = walker.walk(Direction::Successors, &[4], 5).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_walk_past_oldest_slot_is_fault() {
        // No boundary anywhere, so a backward walk from the oldest slot wraps onto the newest
        let terminal = vec![No; 4];
        let walker = Walker::new(&terminal, 4);
        let err = walker.walk(Direction::Predecessors, &[0], 1).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, ReplayError::ConsistencyFault(_)));
    }

    #[test]
    fn test_window_out_of_range() {
        let terminal = column();
        let walker = Walker::new(&terminal, 7);
        let windows = walker.walk(Direction::Predecessors, &[5], 1).unwrap();
        assert_eq!(windows.window(0), Some(&[4, 5][..]));
        assert_eq!(windows.window(1), None);
        assert_eq!(Windows::default().window(0), None);
    }
}
