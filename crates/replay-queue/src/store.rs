//! Columnar field storage, one column per declared field

use indexmap::IndexMap;
use ndarray::Array1;

use replay_core::schema::TERMINAL;
use replay_core::{FieldSpec, ReplayError, Result, Tensor, Terminal, Timesteps, Value, ValuesSpec};

#[derive(Debug, Clone)]
enum Column {
    /// Stands in for the typed terminal column held by the store itself
    Terminal,
    Leaf(Tensor),
    Nested(IndexMap<String, Tensor>),
}

/// Parallel columns of `capacity` slots
#[derive(Debug, Clone)]
pub struct FieldStore {
    spec: ValuesSpec,
    capacity: usize,
    terminal: Vec<Terminal>,
    columns: IndexMap<String, Column>,
}

impl FieldStore {
    /// Allocate zero-filled columns for every field of `spec`
    ///
    /// The last terminal slot is preset to a genuine terminal; it is the seed
    /// boundary that the boundary ring starts from.
    pub fn new(spec: ValuesSpec, capacity: usize) -> Result<Self> {
        spec.validate()?;
        if capacity == 0 {
            return Err(ReplayError::Config("capacity must be positive".to_string()));
        }

        let columns = spec
            .iter()
            .map(|(name, field)| {
                let column = match field {
                    _ if name == TERMINAL => Column::Terminal,
                    FieldSpec::Leaf(tensor) => Column::Leaf(tensor.zeros(capacity)),
                    FieldSpec::Nested(inner) => Column::Nested(
                        inner
                            .iter()
                            .map(|(inner_name, tensor)| (inner_name.clone(), tensor.zeros(capacity)))
                            .collect(),
                    ),
                };
                (name.to_string(), column)
            })
            .collect();

        let mut terminal = vec![Terminal::No; capacity];
        terminal[capacity - 1] = Terminal::Terminal;

        Ok(Self {
            spec,
            capacity,
            terminal,
            columns,
        })
    }

    /// Values specification the store was built from
    #[must_use]
    pub fn spec(&self) -> &ValuesSpec {
        &self.spec
    }

    /// Number of slots
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Terminal column
    #[must_use]
    pub fn terminal(&self) -> &[Terminal] {
        &self.terminal
    }

    /// Overwrite one terminal flag
    pub fn set_terminal(&mut self, slot: usize, flag: Terminal) {
        self.terminal[slot] = flag;
    }

    /// Number of slots holding a nonzero terminal flag
    #[must_use]
    pub fn boundary_count(&self) -> usize {
        self.terminal.iter().filter(|flag| flag.is_boundary()).count()
    }

    /// Whether `name` is a stored field
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Check that a batch provides every declared field with the right shape
    pub fn validate_batch(&self, batch: &Timesteps) -> Result<()> {
        let rows = batch.len();
        for (name, _) in batch.values() {
            if name == TERMINAL {
                return Err(ReplayError::InvalidArgument(
                    "terminal flags are passed through Timesteps::new, not as a field".to_string(),
                ));
            }
            if !self.spec.contains(name) {
                return Err(ReplayError::UnknownField(name.to_string()));
            }
        }
        for (name, field) in self.spec.iter().filter(|(name, _)| *name != TERMINAL) {
            let value = batch
                .get(name)
                .ok_or_else(|| ReplayError::InvalidArgument(format!("missing values for {name}")))?;
            field.check(name, value, rows)?;
        }
        Ok(())
    }

    /// Write a validated batch to `slots`, columns in declaration order
    ///
    /// A final non-terminal flag is stored as [`Terminal::Pending`].
    pub fn write(&mut self, slots: &[usize], batch: &Timesteps) -> Result<()> {
        let Self {
            terminal, columns, ..
        } = self;

        for (name, column) in columns.iter_mut() {
            match column {
                Column::Terminal => {
                    let flags = batch.terminal();
                    let last = flags.len().saturating_sub(1);
                    for (i, (&slot, &flag)) in slots.iter().zip(flags).enumerate() {
                        terminal[slot] = if i == last && flag == Terminal::No {
                            Terminal::Pending
                        } else {
                            flag
                        };
                    }
                }
                Column::Leaf(tensor) => {
                    let value = batch_tensor(batch, name)?;
                    tensor.scatter(slots, value)?;
                }
                Column::Nested(tensors) => {
                    let values = batch
                        .get(name)
                        .and_then(Value::as_nested)
                        .ok_or_else(|| ReplayError::InvalidArgument(format!("missing values for {name}")))?;
                    for (inner, tensor) in tensors.iter_mut() {
                        let value = values.get(inner).ok_or_else(|| {
                            ReplayError::InvalidArgument(format!("missing values for {name}/{inner}"))
                        })?;
                        tensor.scatter(slots, value)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Gather a field at `indices`
    ///
    /// Indices must already be known to be smaller than the capacity.
    pub fn gather(&self, name: &str, indices: &[usize]) -> Result<Value> {
        let column = self
            .columns
            .get(name)
            .ok_or_else(|| ReplayError::UnknownField(name.to_string()))?;
        Ok(match column {
            Column::Terminal => {
                let codes: Array1<i64> = indices.iter().map(|&i| self.terminal[i].code()).collect();
                Value::Tensor(Tensor::from(codes))
            }
            Column::Leaf(tensor) => Value::Tensor(tensor.gather(indices)),
            Column::Nested(tensors) => Value::Nested(
                tensors
                    .iter()
                    .map(|(inner, tensor)| (inner.clone(), tensor.gather(indices)))
                    .collect(),
            ),
        })
    }
}

fn batch_tensor<'a>(batch: &'a Timesteps, name: &str) -> Result<&'a Tensor> {
    batch
        .get(name)
        .and_then(Value::as_tensor)
        .ok_or_else(|| ReplayError::InvalidArgument(format!("missing values for {name}")))
}
