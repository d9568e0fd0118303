//! Values specification: which fields a memory stores and their shapes

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::tensor::{DType, Tensor, Value};
use crate::{ReplayError, Result};

/// Name of the observation group
pub const STATES: &str = "states";
/// Name of the internal-state group
pub const INTERNALS: &str = "internals";
/// Name of the auxiliary-input group
pub const AUXILIARIES: &str = "auxiliaries";
/// Name of the action group
pub const ACTIONS: &str = "actions";
/// Name of the terminal field
pub const TERMINAL: &str = "terminal";
/// Name of the reward field
pub const REWARD: &str = "reward";

/// Type and per-timestep shape of a tensor field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorSpec {
    /// Element type
    pub dtype: DType,
    /// Shape of a single timestep's value
    #[serde(default)]
    pub shape: Vec<usize>,
}

impl TensorSpec {
    /// Create a new tensor specification
    #[must_use]
    pub fn new(dtype: DType, shape: &[usize]) -> Self {
        Self {
            dtype,
            shape: shape.to_vec(),
        }
    }

    /// Float field of the given shape
    #[must_use]
    pub fn float(shape: &[usize]) -> Self {
        Self::new(DType::Float, shape)
    }

    /// Integer field of the given shape
    #[must_use]
    pub fn int(shape: &[usize]) -> Self {
        Self::new(DType::Int, shape)
    }

    /// Boolean field of the given shape
    #[must_use]
    pub fn bool(shape: &[usize]) -> Self {
        Self::new(DType::Bool, shape)
    }

    /// Shape of `rows` stacked values
    #[must_use]
    pub fn batched_shape(&self, rows: usize) -> Vec<usize> {
        std::iter::once(rows).chain(self.shape.iter().copied()).collect()
    }

    /// Allocate a zero-filled column of `rows` values
    #[must_use]
    pub fn zeros(&self, rows: usize) -> Tensor {
        Tensor::zeros(self.dtype, &self.batched_shape(rows))
    }

    /// Check that `tensor` holds `rows` values of this specification
    pub fn check(&self, field: &str, tensor: &Tensor, rows: usize) -> Result<()> {
        if tensor.dtype() != self.dtype {
            return Err(ReplayError::InvalidArgument(format!(
                "field {field} expects {:?} values, got {:?}",
                self.dtype,
                tensor.dtype()
            )));
        }
        let expected = self.batched_shape(rows);
        if tensor.shape() != expected.as_slice() {
            return Err(ReplayError::DimensionMismatch {
                field: field.to_string(),
                expected,
                actual: tensor.shape().to_vec(),
            });
        }
        Ok(())
    }
}

/// Specification of one named field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
    /// Single tensor
    Leaf(TensorSpec),
    /// Group of sub-fields stored separately but addressed as a unit
    Nested(IndexMap<String, TensorSpec>),
}

impl FieldSpec {
    /// Whether this field is a composite group
    #[must_use]
    pub fn is_nested(&self) -> bool {
        matches!(self, Self::Nested(_))
    }

    /// Check that `value` holds `rows` timesteps of this field
    pub fn check(&self, field: &str, value: &Value, rows: usize) -> Result<()> {
        match (self, value) {
            (Self::Leaf(spec), Value::Tensor(tensor)) => spec.check(field, tensor, rows),
            (Self::Nested(specs), Value::Nested(tensors)) => {
                if let Some(extra) = tensors.keys().find(|name| !specs.contains_key(*name)) {
                    return Err(ReplayError::UnknownField(format!("{field}/{extra}")));
                }
                for (inner, spec) in specs {
                    let tensor = tensors.get(inner).ok_or_else(|| {
                        ReplayError::InvalidArgument(format!("missing values for {field}/{inner}"))
                    })?;
                    spec.check(&format!("{field}/{inner}"), tensor, rows)?;
                }
                Ok(())
            }
            (Self::Leaf(_), Value::Nested(_)) => Err(ReplayError::InvalidArgument(format!(
                "field {field} is a plain tensor, got a nested group"
            ))),
            (Self::Nested(_), Value::Tensor(_)) => Err(ReplayError::InvalidArgument(format!(
                "field {field} is a nested group, got a plain tensor"
            ))),
        }
    }
}

/// Ordered mapping from field name to field specification
///
/// Declaration order is the order in which a memory writes its columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValuesSpec {
    fields: IndexMap<String, FieldSpec>,
}

impl ValuesSpec {
    /// Create an empty specification
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard timestep layout: four composite groups plus terminal and reward
    #[must_use]
    pub fn timestep(
        states: IndexMap<String, TensorSpec>,
        internals: IndexMap<String, TensorSpec>,
        auxiliaries: IndexMap<String, TensorSpec>,
        actions: IndexMap<String, TensorSpec>,
    ) -> Self {
        Self::new()
            .nested(STATES, states)
            .nested(INTERNALS, internals)
            .nested(AUXILIARIES, auxiliaries)
            .nested(ACTIONS, actions)
            .leaf(TERMINAL, TensorSpec::int(&[]))
            .leaf(REWARD, TensorSpec::float(&[]))
    }

    /// Add a plain field
    #[must_use]
    pub fn leaf(mut self, name: impl Into<String>, spec: TensorSpec) -> Self {
        self.fields.insert(name.into(), FieldSpec::Leaf(spec));
        self
    }

    /// Add a composite field
    #[must_use]
    pub fn nested(mut self, name: impl Into<String>, specs: IndexMap<String, TensorSpec>) -> Self {
        self.fields.insert(name.into(), FieldSpec::Nested(specs));
        self
    }

    /// Add the terminal field
    #[must_use]
    pub fn with_terminal(self) -> Self {
        self.leaf(TERMINAL, TensorSpec::int(&[]))
    }

    /// Look up a field
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Whether a field is declared
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Fields in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// Number of declared fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field is declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check that the specification can back a memory
    ///
    /// The terminal field is mandatory and must be a scalar integer.
    pub fn validate(&self) -> Result<()> {
        match self.fields.get(TERMINAL) {
            Some(FieldSpec::Leaf(spec)) if spec.dtype == DType::Int && spec.shape.is_empty() => {}
            Some(_) => {
                return Err(ReplayError::Config(
                    "terminal must be a scalar int field".to_string(),
                ))
            }
            None => {
                return Err(ReplayError::Config(
                    "values specification has no terminal field".to_string(),
                ))
            }
        }
        if let Some((name, _)) = self
            .fields
            .iter()
            .find(|(name, _)| name.is_empty() || name.contains('/'))
        {
            return Err(ReplayError::Config(format!("invalid field name {name:?}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn obs_spec() -> IndexMap<String, TensorSpec> {
        IndexMap::from([("obs".to_string(), TensorSpec::float(&[2]))])
    }

    #[test]
    fn test_timestep_layout_order() {
        let spec = ValuesSpec::timestep(obs_spec(), IndexMap::new(), IndexMap::new(), obs_spec());
        let names: Vec<&str> = spec.iter().map(|(name, _)| name).collect();
        assert_eq!(names, [STATES, INTERNALS, AUXILIARIES, ACTIONS, TERMINAL, REWARD]);
        assert!(spec.get(STATES).unwrap().is_nested());
        spec.validate().unwrap();
    }

    #[test]
    fn test_validate_requires_scalar_int_terminal() {
        assert!(ValuesSpec::new().validate().is_err());
        let bad = ValuesSpec::new().leaf(TERMINAL, TensorSpec::bool(&[]));
        assert!(matches!(bad.validate(), Err(ReplayError::Config(_))));
        ValuesSpec::new().with_terminal().validate().unwrap();
    }

    #[test]
    fn test_nested_check() {
        let field = FieldSpec::Nested(obs_spec());
        let ok = Value::Nested(IndexMap::from([(
            "obs".to_string(),
            Tensor::from(arr2(&[[1.0f32, 2.0], [3.0, 4.0], [5.0, 6.0]])),
        )]));
        field.check(STATES, &ok, 3).unwrap();

        let err = field.check(STATES, &ok, 2).unwrap_err();
        assert!(matches!(err, ReplayError::DimensionMismatch { .. }));

        let err = field
            .check(STATES, &Value::Nested(IndexMap::new()), 3)
            .unwrap_err();
        assert!(matches!(err, ReplayError::InvalidArgument(_)));
    }

    #[test]
    fn test_spec_serde() {
        let spec = ValuesSpec::new()
            .with_terminal()
            .nested(STATES, obs_spec());
        let json = serde_json::to_string(&spec).unwrap();
        let back: ValuesSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }
}
