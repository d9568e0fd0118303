//! Episodic replay queue
//!
//! A fixed-capacity ring of timesteps that keeps track of where episodes end:
//! - [`Queue::enqueue`] appends timesteps and evicts the oldest episodes
//! - [`Queue::retrieve`] gathers fields at arbitrary slots
//! - [`Queue::predecessors`] / [`Queue::successors`] walk windows that never
//!   cross an episode boundary
//! - [`SharedQueue`] shares one queue between a producer and trainers

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod boundary;
pub mod queue;
pub mod shared;
pub mod store;
pub mod window;

pub use boundary::{BoundaryRing, Position};
pub use queue::{Queue, QueueStats};
pub use shared::SharedQueue;
pub use store::FieldStore;
pub use window::{Direction, StopReason, WindowBatch, Windows};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{Queue, QueueStats, SharedQueue, StopReason, WindowBatch, Windows};
    pub use replay_core::prelude::*;
}
