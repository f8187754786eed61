//! Process configuration types.
//!
//! A configuration is plain JSON:
//!
//! ```json
//! {
//!   "origination": [1.0, 0.8],
//!   "termination": 0.5,
//!   "sampling": 0.2,
//!   "boundary_sampling": 1.0,
//!   "timeline": [10.0],
//!   "condition": "survival",
//!   "observations": { "interval_counts": [3, 7] }
//! }
//! ```

use crate::validate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};

/// A rate given either once for all intervals or once per interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RateSpec {
    Homogeneous(f64),
    PerInterval(Vec<f64>),
}

impl RateSpec {
    pub fn is_homogeneous(&self) -> bool {
        matches!(self, RateSpec::Homogeneous(_))
    }
}

impl From<f64> for RateSpec {
    fn from(value: f64) -> Self {
        RateSpec::Homogeneous(value)
    }
}

impl From<Vec<f64>> for RateSpec {
    fn from(values: Vec<f64>) -> Self {
        RateSpec::PerInterval(values)
    }
}

/// What the likelihood is conditioned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// No conditioning.
    #[default]
    None,
    /// Condition on the process surviving from its origin to the boundary.
    Survival,
}

/// Rate and timeline parameters. These are what a sampler perturbs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateParameters {
    pub origination: RateSpec,
    pub termination: RateSpec,
    pub sampling: RateSpec,
    /// Instantaneous sampling probability at the boundary (time 0).
    pub boundary_sampling: f64,
    /// Rate-change times; ascending or descending. `None` means one interval.
    #[serde(default)]
    pub timeline: Option<Vec<f64>>,
}

/// Raw observation-count inputs. At most one of the count fields may be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationInputs {
    /// One aggregate count over the whole process.
    #[serde(default)]
    pub total_count: Option<u64>,
    /// One count per interval, in timeline order.
    #[serde(default)]
    pub interval_counts: Option<Vec<u64>>,
    /// One row per range, one count per interval in timeline order.
    #[serde(default)]
    pub range_interval_counts: Option<Vec<Vec<u64>>>,
    /// Read `range_interval_counts` as presence (> 0) / absence indicators.
    #[serde(default)]
    pub presence_absence: bool,
}

/// Complete description of a range process model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    #[serde(flatten)]
    pub parameters: RateParameters,

    #[serde(default)]
    pub condition: Condition,

    #[serde(default)]
    pub observations: ObservationInputs,
}

impl ProcessConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_json_str(&content)
    }

    /// Parse a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ConfigError::ParseError(format!("Invalid JSON: {}", e)))
    }
}

/// One observed range.
///
/// `start` and `end` are the origination and termination times the sampler
/// moves; `first_observed` and `last_observed` bound the observations and never
/// change. Times run backwards from the boundary at 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub start: f64,
    pub end: f64,
    pub first_observed: f64,
    pub last_observed: f64,
}

impl Range {
    pub fn new(start: f64, end: f64, first_observed: f64, last_observed: f64) -> Self {
        Self {
            start,
            end,
            first_observed,
            last_observed,
        }
    }

    /// Whether the range survives to the boundary.
    pub fn is_extant(&self) -> bool {
        self.end == 0.0
    }

    /// Load a list of ranges from a JSON file.
    pub fn list_from_file(path: &std::path::Path) -> ConfigResult<Vec<Self>> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("Invalid JSON: {}", e)))
    }
}
