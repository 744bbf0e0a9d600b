//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Tunable pipeline parameters. The defaults mirror the reference behavior;
/// any positive values keep the simulation deterministic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Frontier cells handed to one worker task.
    pub chunk_size: usize,
    /// Capacity of the producer/consumer result queue.
    pub queue_capacity: usize,
    /// Minimum milliseconds between two render handoffs.
    pub min_tick_ms: u64,
    /// Period of the progress sampler in milliseconds.
    pub progress_period_ms: u64,
    /// Worker pool size; `None` means available parallelism + 1.
    pub workers: Option<usize>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            queue_capacity: 100,
            min_tick_ms: 1500,
            progress_period_ms: 250,
            workers: None,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.chunk_size == 0 {
            return Err(EngineError::InvalidConfig("chunk_size must be positive"));
        }
        if self.queue_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "queue_capacity must be positive",
            ));
        }
        if self.workers == Some(0) {
            return Err(EngineError::InvalidConfig("workers must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_fields() {
        let config = SimConfig {
            chunk_size: 0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SimConfig {
            queue_capacity: 0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SimConfig {
            workers: Some(0),
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
