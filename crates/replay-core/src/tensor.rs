//! Columnar tensor values exchanged with a memory

use indexmap::IndexMap;
use ndarray::{Array, ArrayD, Axis, Dimension, IxDyn};
use serde::{Deserialize, Serialize};

use crate::{ReplayError, Result};

/// Element type of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// Boolean elements
    Bool,
    /// 64-bit signed integers
    Int,
    /// 32-bit floats
    Float,
}

/// Dense tensor whose first axis indexes timesteps (or slots)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Tensor {
    /// Boolean tensor
    Bool(ArrayD<bool>),
    /// Integer tensor
    Int(ArrayD<i64>),
    /// Float tensor
    Float(ArrayD<f32>),
}

impl Tensor {
    /// Create a zero-filled tensor
    #[must_use]
    pub fn zeros(dtype: DType, shape: &[usize]) -> Self {
        let dim = IxDyn(shape);
        match dtype {
            DType::Bool => Self::Bool(ArrayD::from_elem(dim, false)),
            DType::Int => Self::Int(ArrayD::zeros(dim)),
            DType::Float => Self::Float(ArrayD::zeros(dim)),
        }
    }

    /// Element type
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::Bool(_) => DType::Bool,
            Self::Int(_) => DType::Int,
            Self::Float(_) => DType::Float,
        }
    }

    /// Full shape, leading axis included
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Bool(a) => a.shape(),
            Self::Int(a) => a.shape(),
            Self::Float(a) => a.shape(),
        }
    }

    /// Length of the leading axis (0 for a scalar)
    #[must_use]
    pub fn len(&self) -> usize {
        self.shape().first().copied().unwrap_or(0)
    }

    /// Whether the leading axis is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Select rows along the leading axis
    ///
    /// Indices may repeat and appear in any order. Every index must be smaller
    /// than [`Tensor::len`]; the caller checks this.
    #[must_use]
    pub fn gather(&self, indices: &[usize]) -> Self {
        match self {
            Self::Bool(a) => Self::Bool(a.select(Axis(0), indices)),
            Self::Int(a) => Self::Int(a.select(Axis(0), indices)),
            Self::Float(a) => Self::Float(a.select(Axis(0), indices)),
        }
    }

    /// Overwrite rows `slots[i]` of `self` with row `i` of `src`
    pub fn scatter(&mut self, slots: &[usize], src: &Self) -> Result<()> {
        if src.len() != slots.len() {
            return Err(ReplayError::InvalidArgument(format!(
                "scatter of {} rows into {} slots",
                src.len(),
                slots.len()
            )));
        }
        match (self, src) {
            (Self::Bool(dst), Self::Bool(src)) => scatter_rows(dst, slots, src),
            (Self::Int(dst), Self::Int(src)) => scatter_rows(dst, slots, src),
            (Self::Float(dst), Self::Float(src)) => scatter_rows(dst, slots, src),
            (dst, src) => {
                return Err(ReplayError::InvalidArgument(format!(
                    "cannot scatter {:?} values into a {:?} column",
                    src.dtype(),
                    dst.dtype()
                )))
            }
        }
        Ok(())
    }

    /// Borrow as a float array
    #[must_use]
    pub fn as_float(&self) -> Option<&ArrayD<f32>> {
        match self {
            Self::Float(a) => Some(a),
            _ => None,
        }
    }

    /// Borrow as an integer array
    #[must_use]
    pub fn as_int(&self) -> Option<&ArrayD<i64>> {
        match self {
            Self::Int(a) => Some(a),
            _ => None,
        }
    }

    /// Borrow as a boolean array
    #[must_use]
    pub fn as_bool(&self) -> Option<&ArrayD<bool>> {
        match self {
            Self::Bool(a) => Some(a),
            _ => None,
        }
    }
}

fn scatter_rows<A: Clone>(dst: &mut ArrayD<A>, slots: &[usize], src: &ArrayD<A>) {
    for (row, &slot) in slots.iter().enumerate() {
        dst.index_axis_mut(Axis(0), slot)
            .assign(&src.index_axis(Axis(0), row));
    }
}

impl<D: Dimension> From<Array<f32, D>> for Tensor {
    fn from(array: Array<f32, D>) -> Self {
        Self::Float(array.into_dyn())
    }
}

impl<D: Dimension> From<Array<i64, D>> for Tensor {
    fn from(array: Array<i64, D>) -> Self {
        Self::Int(array.into_dyn())
    }
}

impl<D: Dimension> From<Array<bool, D>> for Tensor {
    fn from(array: Array<bool, D>) -> Self {
        Self::Bool(array.into_dyn())
    }
}

impl From<Vec<f32>> for Tensor {
    fn from(values: Vec<f32>) -> Self {
        Array::from_vec(values).into()
    }
}

impl From<Vec<i64>> for Tensor {
    fn from(values: Vec<i64>) -> Self {
        Array::from_vec(values).into()
    }
}

impl From<Vec<bool>> for Tensor {
    fn from(values: Vec<bool>) -> Self {
        Array::from_vec(values).into()
    }
}

/// Value of one field: a single tensor or a named group of tensors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Plain field
    Tensor(Tensor),
    /// Composite field, one tensor per sub-field
    Nested(IndexMap<String, Tensor>),
}

impl Value {
    /// Borrow the plain tensor, if this is not a composite value
    #[must_use]
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Self::Tensor(t) => Some(t),
            Self::Nested(_) => None,
        }
    }

    /// Borrow the sub-field map, if this is a composite value
    #[must_use]
    pub fn as_nested(&self) -> Option<&IndexMap<String, Tensor>> {
        match self {
            Self::Tensor(_) => None,
            Self::Nested(map) => Some(map),
        }
    }
}

impl From<Tensor> for Value {
    fn from(tensor: Tensor) -> Self {
        Self::Tensor(tensor)
    }
}

impl From<IndexMap<String, Tensor>> for Value {
    fn from(map: IndexMap<String, Tensor>) -> Self {
        Self::Nested(map)
    }
}
