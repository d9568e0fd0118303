//! Core types for episodic replay memories
//!
//! This crate provides the value model shared by memory implementations:
//! terminal flags, columnar tensors, the field schema a memory is built from,
//! timestep batches, configuration and the common error type.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod schema;
pub mod tensor;
pub mod terminal;
pub mod timesteps;

// Re-export core types
pub use config::QueueConfig;
pub use error::{ErrorClass, ReplayError, Result};
pub use schema::{FieldSpec, TensorSpec, ValuesSpec};
pub use tensor::{DType, Tensor, Value};
pub use terminal::Terminal;
pub use timesteps::Timesteps;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::schema::{ACTIONS, AUXILIARIES, INTERNALS, REWARD, STATES, TERMINAL};
    pub use crate::{
        DType, FieldSpec, QueueConfig, ReplayError, Result, Tensor, TensorSpec, Terminal,
        Timesteps, Value, ValuesSpec,
    };
}
