//! Configuration errors and value validation.

use thiserror::Error;

/// Configuration result type.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors detected while loading or resolving a process configuration.
///
/// All of these are fatal for the caller that assembled the engine; none of them
/// is ever produced during likelihood evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Number of {parameter} ({actual}) does not match number of time intervals ({expected})")]
    ShapeMismatch {
        parameter: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Conflicting observation data supplied: {}", supplied.join(", "))]
    ConflictingDataRegime { supplied: Vec<&'static str> },

    #[error("Unsupported observation data regime: {0}")]
    UnsupportedDataRegime(String),

    #[error("No time intervals provided for per-interval {parameter}")]
    MissingTimeline { parameter: &'static str },

    #[error("Interval times must be provided in order")]
    UnorderedTimeline,

    #[error("Number of per-range observation rows ({actual}) does not match number of ranges ({expected})")]
    RangeCountMismatch { expected: usize, actual: usize },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ConfigError::IoError(_) => 60,
            ConfigError::ParseError(_) => 61,
            ConfigError::ShapeMismatch { .. } => 62,
            ConfigError::ConflictingDataRegime { .. } => 63,
            ConfigError::UnsupportedDataRegime(_) => 64,
            ConfigError::MissingTimeline { .. } => 65,
            ConfigError::UnorderedTimeline => 66,
            ConfigError::RangeCountMismatch { .. } => 67,
            ConfigError::InvalidValue { .. } => 68,
        }
    }
}

/// Rates must be finite and non-negative.
pub fn validate_rate(field: &str, value: f64) -> ConfigResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("Must be finite and >= 0, got {}", value),
        });
    }
    Ok(())
}

/// Probabilities must lie in [0, 1].
pub fn validate_probability(field: &str, value: f64) -> ConfigResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("Must be in [0, 1], got {}", value),
        });
    }
    Ok(())
}

/// Breakpoints must be finite and non-negative.
pub fn validate_breakpoints(times: &[f64]) -> ConfigResult<()> {
    for (i, t) in times.iter().enumerate() {
        if !t.is_finite() || *t < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: format!("timeline[{}]", i),
                message: format!("Must be finite and >= 0, got {}", t),
            });
        }
    }
    Ok(())
}
