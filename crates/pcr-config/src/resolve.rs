//! Parameter resolution.
//!
//! Turns the loosely typed [`ProcessConfig`] into per-interval arrays in the
//! internal interval order: index 0 is the oldest interval (unbounded above) and
//! index `k - 1` is the boundary interval whose younger bound is time 0.
//! Breakpoints may be supplied youngest-first (ascending) or oldest-first
//! (descending); per-interval inputs follow the same order as the breakpoints.

use crate::model::{ObservationInputs, ProcessConfig, RateParameters, RateSpec};
use crate::validate::{
    validate_breakpoints, validate_probability, validate_rate, ConfigError, ConfigResult,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The three rates that may vary per interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateKind {
    Origination,
    Termination,
    Sampling,
}

impl RateKind {
    /// Plural name used in shape errors.
    pub fn label(&self) -> &'static str {
        match self {
            RateKind::Origination => "origination rates",
            RateKind::Termination => "termination rates",
            RateKind::Sampling => "sampling rates",
        }
    }
}

impl std::fmt::Display for RateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateKind::Origination => write!(f, "origination"),
            RateKind::Termination => write!(f, "termination"),
            RateKind::Sampling => write!(f, "sampling"),
        }
    }
}

/// Any parameter whose change invalidates the interval cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Rate(RateKind),
    BoundarySampling,
    Timeline,
}

impl From<RateKind> for ParameterKind {
    fn from(kind: RateKind) -> Self {
        ParameterKind::Rate(kind)
    }
}

/// Interval partition of the time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    /// Younger bound of each interval, descending; the last entry is 0.
    lower_bounds: Vec<f64>,
    /// Whether the supplied breakpoints were youngest-first.
    ascending: bool,
}

impl Timeline {
    /// Build the partition from optional breakpoints.
    ///
    /// Breakpoints sorted in neither direction are rejected. Input that is sorted
    /// both ways (a single breakpoint, or all equal) is treated as ascending.
    pub fn from_breakpoints(breakpoints: Option<&[f64]>) -> ConfigResult<Self> {
        let Some(times) = breakpoints else {
            return Ok(Self {
                lower_bounds: vec![0.0],
                ascending: false,
            });
        };
        validate_breakpoints(times)?;

        let ascending = times.windows(2).all(|w| w[0] <= w[1]);
        let descending = times.windows(2).all(|w| w[0] >= w[1]);
        if !ascending && !descending {
            return Err(ConfigError::UnorderedTimeline);
        }

        let mut lower_bounds: Vec<f64> = times.to_vec();
        if ascending {
            lower_bounds.reverse();
        }
        lower_bounds.push(0.0);

        Ok(Self {
            lower_bounds,
            ascending,
        })
    }

    pub fn interval_count(&self) -> usize {
        self.lower_bounds.len()
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    /// Younger bound of every interval, internal order.
    pub fn lower_bounds(&self) -> &[f64] {
        &self.lower_bounds
    }

    /// Younger bound of interval `i`.
    pub fn lower_bound(&self, i: usize) -> f64 {
        self.lower_bounds[i]
    }

    /// Older bound of interval `i`; infinite for the oldest interval.
    pub fn upper_bound(&self, i: usize) -> f64 {
        if i == 0 {
            f64::INFINITY
        } else {
            self.lower_bounds[i - 1]
        }
    }

    /// Index `i` such that `upper_bound(i) > t >= lower_bound(i)`.
    ///
    /// Binary search over the descending bounds. Panics for negative or NaN
    /// times, which lie outside every interval.
    pub fn interval_index(&self, t: f64) -> usize {
        assert!(t >= 0.0, "time {} lies outside the interval partition", t);
        self.lower_bounds.partition_point(|&bound| bound > t)
    }

    /// Map a position in supplied (timeline-ordered) input to the internal index.
    pub fn internal_index(&self, supplied: usize) -> usize {
        if self.ascending {
            self.interval_count() - 1 - supplied
        } else {
            supplied
        }
    }

    /// Reorder a per-interval input into internal order.
    pub fn to_internal<T: Clone>(&self, supplied: &[T]) -> Vec<T> {
        let mut out = supplied.to_vec();
        if self.ascending {
            out.reverse();
        }
        out
    }
}

/// Rates resolved to one value per interval, internal order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRates {
    pub timeline: Timeline,
    pub origination: Vec<f64>,
    pub termination: Vec<f64>,
    pub sampling: Vec<f64>,
    pub boundary_sampling: f64,
}

impl ResolvedRates {
    pub fn interval_count(&self) -> usize {
        self.timeline.interval_count()
    }
}

/// Resolve one rate specification against the timeline.
pub fn resolve_rate(kind: RateKind, spec: &RateSpec, timeline: Option<&Timeline>) -> ConfigResult<Vec<f64>> {
    let count = timeline.map_or(1, Timeline::interval_count);
    match spec {
        RateSpec::Homogeneous(value) => {
            validate_rate(&kind.to_string(), *value)?;
            Ok(vec![*value; count])
        }
        RateSpec::PerInterval(values) => {
            let Some(timeline) = timeline else {
                return Err(ConfigError::MissingTimeline {
                    parameter: kind.label(),
                });
            };
            if values.len() != count {
                return Err(ConfigError::ShapeMismatch {
                    parameter: kind.label(),
                    expected: count,
                    actual: values.len(),
                });
            }
            for (i, v) in values.iter().enumerate() {
                validate_rate(&format!("{}[{}]", kind, i), *v)?;
            }
            Ok(timeline.to_internal(values))
        }
    }
}

impl RateParameters {
    pub fn spec_mut(&mut self, kind: RateKind) -> &mut RateSpec {
        match kind {
            RateKind::Origination => &mut self.origination,
            RateKind::Termination => &mut self.termination,
            RateKind::Sampling => &mut self.sampling,
        }
    }

    /// Resolve all rates and the timeline.
    pub fn resolve(&self) -> ConfigResult<ResolvedRates> {
        validate_probability("boundary_sampling", self.boundary_sampling)?;

        let timeline = Timeline::from_breakpoints(self.timeline.as_deref())?;
        let supplied = self.timeline.is_some().then_some(&timeline);

        Ok(ResolvedRates {
            origination: resolve_rate(RateKind::Origination, &self.origination, supplied)?,
            termination: resolve_rate(RateKind::Termination, &self.termination, supplied)?,
            sampling: resolve_rate(RateKind::Sampling, &self.sampling, supplied)?,
            boundary_sampling: self.boundary_sampling,
            timeline,
        })
    }
}

/// The observation data regime, resolved to internal interval order.
#[derive(Debug, Clone, PartialEq)]
pub enum DataRegime {
    /// Counts are unknown and integrated out.
    Marginalized,
    /// One aggregate count; requires a homogeneous sampling rate.
    Total(u64),
    /// One count per interval.
    PerInterval(Vec<u64>),
    /// One count per range and interval.
    PerRange(Vec<Vec<u64>>),
    /// Presence/absence per range and interval.
    PresenceAbsence(Vec<Vec<bool>>),
}

impl DataRegime {
    pub fn name(&self) -> &'static str {
        match self {
            DataRegime::Marginalized => "marginalized",
            DataRegime::Total(_) => "total",
            DataRegime::PerInterval(_) => "per_interval",
            DataRegime::PerRange(_) => "per_range",
            DataRegime::PresenceAbsence(_) => "presence_absence",
        }
    }

    /// Check that a sampling-rate specification is usable with this regime.
    pub fn check_sampling(&self, sampling: &RateSpec) -> ConfigResult<()> {
        if matches!(self, DataRegime::Total(_)) && !sampling.is_homogeneous() {
            return Err(ConfigError::UnsupportedDataRegime(
                "heterogeneous sampling rates provided, but a single total count".to_string(),
            ));
        }
        Ok(())
    }
}

impl ObservationInputs {
    /// Resolve the raw inputs into exactly one regime.
    pub fn resolve(
        &self,
        timeline: &Timeline,
        sampling: &RateSpec,
        range_count: usize,
    ) -> ConfigResult<DataRegime> {
        let mut supplied = Vec::new();
        if self.total_count.is_some() {
            supplied.push("total_count");
        }
        if self.interval_counts.is_some() {
            supplied.push("interval_counts");
        }
        if self.range_interval_counts.is_some() {
            supplied.push("range_interval_counts");
        }
        if supplied.len() > 1 {
            return Err(ConfigError::ConflictingDataRegime { supplied });
        }

        let k = timeline.interval_count();
        let regime = match (
            self.total_count,
            self.interval_counts.as_ref(),
            self.range_interval_counts.as_ref(),
        ) {
            (None, None, None) => {
                if self.presence_absence {
                    return Err(ConfigError::UnsupportedDataRegime(
                        "cannot marginalize presence/absence data".to_string(),
                    ));
                }
                DataRegime::Marginalized
            }
            (Some(_), _, _) | (_, Some(_), _) if self.presence_absence => {
                return Err(ConfigError::UnsupportedDataRegime(
                    "presence/absence data must be provided by range and interval".to_string(),
                ));
            }
            (Some(total), _, _) => DataRegime::Total(total),
            (_, Some(counts), _) => {
                if counts.len() != k {
                    return Err(ConfigError::ShapeMismatch {
                        parameter: "interval counts",
                        expected: k,
                        actual: counts.len(),
                    });
                }
                DataRegime::PerInterval(timeline.to_internal(counts))
            }
            (_, _, Some(rows)) => {
                if rows.len() != range_count {
                    return Err(ConfigError::RangeCountMismatch {
                        expected: range_count,
                        actual: rows.len(),
                    });
                }
                if let Some(row) = rows.iter().find(|row| row.len() != k) {
                    return Err(ConfigError::ShapeMismatch {
                        parameter: "per-range interval counts",
                        expected: k,
                        actual: row.len(),
                    });
                }
                let internal: Vec<Vec<u64>> = rows.iter().map(|row| timeline.to_internal(row)).collect();
                if self.presence_absence {
                    DataRegime::PresenceAbsence(
                        internal
                            .iter()
                            .map(|row| row.iter().map(|&c| c > 0).collect())
                            .collect(),
                    )
                } else {
                    DataRegime::PerRange(internal)
                }
            }
        };

        regime.check_sampling(sampling)?;
        Ok(regime)
    }
}

/// A fully resolved model ready for evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModel {
    pub rates: ResolvedRates,
    pub regime: DataRegime,
}

impl ProcessConfig {
    /// Run the parameter resolver for a model over `range_count` ranges.
    pub fn resolve(&self, range_count: usize) -> ConfigResult<ResolvedModel> {
        let rates = self.parameters.resolve()?;
        let regime = self
            .observations
            .resolve(&rates.timeline, &self.parameters.sampling, range_count)?;

        debug!(
            intervals = rates.interval_count(),
            ascending = rates.timeline.is_ascending(),
            regime = regime.name(),
            ranges = range_count,
            "resolved process configuration"
        );

        Ok(ResolvedModel { rates, regime })
    }
}
