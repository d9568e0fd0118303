//! Error types for replay memories

use thiserror::Error;

/// Core error type for replay memory operations
#[derive(Error, Debug)]
pub enum ReplayError {
    /// Batch has more timesteps than the memory can hold
    #[error("Memory does not have enough capacity: batch of {batch} timesteps, capacity {capacity}")]
    CapacityExceeded { batch: usize, capacity: usize },

    /// Terminal layout of a batch is malformed
    #[error("Invalid batch shape: {0}")]
    InvalidBatchShape(String),

    /// Malformed call-site request
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Field name not declared in the values specification
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Dimension mismatch
    #[error("Dimension mismatch for {field}: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        field: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Internal invariant violated, the memory instance is no longer trustworthy
    #[error("Memory consistency fault: {0}")]
    ConsistencyFault(String),

    /// Invalid memory configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of a [`ReplayError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller broke the operation contract; never retried by the engine
    Caller,
    /// Internal state is corrupt; the affected memory must be discarded
    Fatal,
    /// Anything raised outside the engine proper (config loading, wrapped errors)
    Other,
}

impl ReplayError {
    /// Classify this error
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::CapacityExceeded { .. }
            | Self::InvalidBatchShape(_)
            | Self::InvalidArgument(_)
            | Self::UnknownField(_)
            | Self::DimensionMismatch { .. } => ErrorClass::Caller,
            Self::ConsistencyFault(_) => ErrorClass::Fatal,
            Self::Config(_) | Self::Serialization(_) | Self::Other(_) => ErrorClass::Other,
        }
    }

    /// Whether this error poisons the memory that raised it
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}

/// Result type alias for replay memory operations
pub type Result<T> = std::result::Result<T, ReplayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let err = ReplayError::CapacityExceeded { batch: 9, capacity: 4 };
        assert_eq!(err.class(), ErrorClass::Caller);
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("capacity 4"));

        let err = ReplayError::ConsistencyFault("terminal count".to_string());
        assert!(err.is_fatal());

        let err = ReplayError::Config("capacity required".to_string());
        assert_eq!(err.class(), ErrorClass::Other);
    }
}
