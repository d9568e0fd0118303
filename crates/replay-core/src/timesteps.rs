//! Batches of consecutive timesteps handed to a memory

use indexmap::IndexMap;
use ndarray::Array1;

use crate::schema::{ACTIONS, AUXILIARIES, INTERNALS, REWARD, STATES};
use crate::tensor::{Tensor, Value};
use crate::Terminal;

/// Consecutive timesteps of (at most the tail of) one episode
///
/// Terminal flags are kept apart from the other fields because the memory
/// derives its episode bookkeeping from them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timesteps {
    terminal: Vec<Terminal>,
    values: IndexMap<String, Value>,
}

impl Timesteps {
    /// Create a batch from its terminal flags; other fields are added with [`Timesteps::with`]
    #[must_use]
    pub fn new(terminal: Vec<Terminal>) -> Self {
        Self {
            terminal,
            values: IndexMap::new(),
        }
    }

    /// Create a batch in the standard timestep layout
    #[must_use]
    pub fn from_parts(
        states: IndexMap<String, Tensor>,
        internals: IndexMap<String, Tensor>,
        auxiliaries: IndexMap<String, Tensor>,
        actions: IndexMap<String, Tensor>,
        terminal: Vec<Terminal>,
        reward: Array1<f32>,
    ) -> Self {
        Self::new(terminal)
            .with(STATES, states)
            .with(INTERNALS, internals)
            .with(AUXILIARIES, auxiliaries)
            .with(ACTIONS, actions)
            .with(REWARD, Tensor::from(reward))
    }

    /// Attach the values of one field
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Number of timesteps
    #[must_use]
    pub fn len(&self) -> usize {
        self.terminal.len()
    }

    /// Whether the batch has no timesteps
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terminal.is_empty()
    }

    /// Terminal flags
    #[must_use]
    pub fn terminal(&self) -> &[Terminal] {
        &self.terminal
    }

    /// Values of a field
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Field values in insertion order
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Whether the batch ends its episode
    #[must_use]
    pub fn ends_episode(&self) -> bool {
        self.terminal.last().is_some_and(|flag| flag.is_genuine())
    }
}
