//! Engine error types

use std::fmt;

/// Errors raised while configuring or initializing the engine
#[derive(Debug)]
pub enum EngineError {
    /// Cell map dimensions must both be positive
    InvalidDimension { width: usize, height: usize },
    /// The view supplied no usable dimensions
    NoDimension,
    /// A configuration field failed validation
    InvalidConfig(&'static str),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidDimension { width, height } => {
                write!(f, "Cell map dimensions must be positive, got {}x{}", width, height)
            }
            EngineError::NoDimension => {
                write!(f, "No cell map dimensions were provided")
            }
            EngineError::InvalidConfig(reason) => {
                write!(f, "Invalid configuration: {}", reason)
            }
        }
    }
}

impl std::error::Error for EngineError {}

/// Errors raised by a single generation computation
#[derive(Debug)]
pub enum ComputeError {
    /// A stop request arrived while chunk tasks were still pending
    Interrupted,
    /// A chunk task died before finishing its cells
    Failed(String),
}

impl fmt::Display for ComputeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeError::Interrupted => write!(f, "Generation computation interrupted"),
            ComputeError::Failed(reason) => {
                write!(f, "Generation computation failed: {}", reason)
            }
        }
    }
}

impl std::error::Error for ComputeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = EngineError::InvalidDimension { width: 0, height: 5 };
        assert!(err.to_string().contains("0x5"));

        let err = ComputeError::Failed("worker died".into());
        assert!(err.to_string().contains("worker died"));
    }
}
