//! Engine errors.
//!
//! Only construction and parameter setters can fail. Evaluation never returns an
//! error: impossible or numerically broken states evaluate to `NEG_INFINITY`.

use pcr_config::ConfigError;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Range index {index} out of bounds for {len} ranges")]
    RangeOutOfBounds { index: usize, len: usize },

    #[error("Invalid time for range {index}: {message}")]
    InvalidTime { index: usize, message: String },

    #[error("Timeline change must keep {expected} intervals in the same direction")]
    TimelineShapeChanged { expected: usize },
}

impl EngineError {
    /// Error code for structured error reporting. Configuration errors keep
    /// their own codes.
    pub fn code(&self) -> u32 {
        match self {
            EngineError::Config(e) => e.code(),
            EngineError::RangeOutOfBounds { .. } => 70,
            EngineError::InvalidTime { .. } => 71,
            EngineError::TimelineShapeChanged { .. } => 72,
        }
    }
}
