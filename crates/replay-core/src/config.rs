//! Memory configuration

use serde::{Deserialize, Serialize};

use crate::{ReplayError, Result};

/// Configuration for a fixed-capacity memory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Number of timesteps retained (defaults to `min_capacity`)
    #[serde(default)]
    pub capacity: Option<usize>,
    /// Lower bound required by the consumer of the memory
    #[serde(default)]
    pub min_capacity: usize,
}

impl QueueConfig {
    /// Configuration with an explicit capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            min_capacity: 0,
        }
    }

    /// Set the minimum capacity
    #[must_use]
    pub fn min_capacity(mut self, min_capacity: usize) -> Self {
        self.min_capacity = min_capacity;
        self
    }

    /// Load a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Effective capacity
    pub fn resolve_capacity(&self) -> Result<usize> {
        match self.capacity {
            None if self.min_capacity == 0 => Err(ReplayError::Config(
                "capacity required: minimum capacity is unknown".to_string(),
            )),
            None => Ok(self.min_capacity),
            Some(0) => Err(ReplayError::Config("capacity must be positive".to_string())),
            Some(capacity) if capacity < self.min_capacity => Err(ReplayError::Config(format!(
                "capacity {capacity} < minimum capacity {}",
                self.min_capacity
            ))),
            Some(capacity) => Ok(capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_capacity() {
        assert_eq!(QueueConfig::with_capacity(8).resolve_capacity().unwrap(), 8);
        assert_eq!(QueueConfig::default().min_capacity(5).resolve_capacity().unwrap(), 5);
        assert!(QueueConfig::default().resolve_capacity().is_err());
        assert!(QueueConfig::with_capacity(0).resolve_capacity().is_err());
        assert!(QueueConfig::with_capacity(3)
            .min_capacity(4)
            .resolve_capacity()
            .is_err());
    }

    #[test]
    fn test_from_json() {
        let config = QueueConfig::from_json(r#"{"capacity": 16, "min_capacity": 4}"#).unwrap();
        assert_eq!(config.resolve_capacity().unwrap(), 16);

        let config = QueueConfig::from_json(r#"{"min_capacity": 32}"#).unwrap();
        assert_eq!(config.capacity, None);
        assert_eq!(config.resolve_capacity().unwrap(), 32);

        assert!(matches!(
            QueueConfig::from_json("{capacity"),
            Err(ReplayError::Serialization(_))
        ));
    }
}
