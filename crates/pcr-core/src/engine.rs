//! The incremental evaluation engine.
//!
//! [`RangeProcessEngine`] owns the ranges, the resolved parameters and both
//! caches. A sampler drives it through one cycle per proposal:
//!
//! ```text
//! set_range / set_rates / ...   (mutate, snapshotting the accepted state)
//! evaluate                      (refresh dirty caches, score)
//! keep | restore                (commit, or roll back to the snapshot)
//! ```
//!
//! The interval cache is rebuilt in full whenever any parameter is dirty. The
//! overlap cache is updated only for ranges marked dirty since the last
//! [`keep`](RangeProcessEngine::keep), unless a full refresh was forced.

use crate::error::{EngineError, EngineResult};
use crate::intervals::IntervalCache;
use crate::likelihood::{LikelihoodBreakdown, LikelihoodInputs};
use crate::observations::ObservationModel;
use crate::overlap::OverlapCache;
use pcr_config::{
    validate::validate_probability, Condition, ConfigError, ParameterKind, ProcessConfig, Range,
    RateKind, RateParameters, RateSpec, ResolvedRates,
};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// State mutated since the last keep, as it was before the first mutation.
#[derive(Debug, Clone, Default)]
struct Snapshot {
    parameters: Option<(RateParameters, ResolvedRates)>,
    ranges: BTreeMap<usize, Range>,
}

impl Snapshot {
    fn is_empty(&self) -> bool {
        self.parameters.is_none() && self.ranges.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RangeProcessEngine {
    parameters: RateParameters,
    rates: ResolvedRates,
    condition: Condition,
    observations: ObservationModel,
    ranges: Vec<Range>,
    intervals: IntervalCache,
    overlap: OverlapCache,
    intervals_dirty: bool,
    overlap_full_refresh: bool,
    snapshot: Snapshot,
}

impl RangeProcessEngine {
    /// Resolve `config` against `ranges` and build both caches.
    pub fn new(config: ProcessConfig, ranges: Vec<Range>) -> EngineResult<Self> {
        for (index, range) in ranges.iter().enumerate() {
            check_range_times(index, range)?;
        }

        let model = config.resolve(ranges.len())?;
        let k = model.rates.interval_count();
        let observations = ObservationModel::from_regime(model.regime, k);
        let intervals = IntervalCache::new(&model.rates);
        let mut overlap = OverlapCache::from_ranges(&ranges);
        overlap.clear_dirty();

        debug!(
            ranges = ranges.len(),
            intervals = k,
            condition = ?config.condition,
            "range process engine constructed"
        );

        Ok(Self {
            parameters: config.parameters,
            rates: model.rates,
            condition: config.condition,
            observations,
            ranges,
            intervals,
            overlap,
            intervals_dirty: false,
            overlap_full_refresh: false,
            snapshot: Snapshot::default(),
        })
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Move the endpoints of range `index` and mark it dirty.
    ///
    /// Out-of-order endpoints are accepted; they make the next evaluation
    /// `NEG_INFINITY`.
    pub fn set_range(&mut self, index: usize, start: f64, end: f64) -> EngineResult<()> {
        let len = self.ranges.len();
        let Some(range) = self.ranges.get_mut(index) else {
            return Err(EngineError::RangeOutOfBounds { index, len });
        };
        for (name, value) in [("start", start), ("end", end)] {
            if !value.is_finite() {
                return Err(EngineError::InvalidTime {
                    index,
                    message: format!("{} must be finite, got {}", name, value),
                });
            }
        }

        self.snapshot.ranges.entry(index).or_insert(*range);
        range.start = start;
        range.end = end;
        self.overlap.mark_dirty(index);
        Ok(())
    }

    /// Replace one rate specification. The interval cache is rebuilt on the
    /// next evaluation.
    pub fn set_rates(&mut self, kind: RateKind, spec: RateSpec) -> EngineResult<()> {
        if kind == RateKind::Sampling {
            self.observations.check_sampling(&spec)?;
        }
        let mut parameters = self.parameters.clone();
        *parameters.spec_mut(kind) = spec;
        self.replace_parameters(parameters, kind.into())
    }

    pub fn set_boundary_sampling(&mut self, probability: f64) -> EngineResult<()> {
        validate_probability("boundary_sampling", probability)?;
        let mut parameters = self.parameters.clone();
        parameters.boundary_sampling = probability;
        self.replace_parameters(parameters, ParameterKind::BoundarySampling)
    }

    /// Move the rate-change times. The number of intervals and the order the
    /// breakpoints are given in must not change, since per-interval inputs are
    /// laid out against them.
    pub fn set_timeline(&mut self, breakpoints: Vec<f64>) -> EngineResult<()> {
        let mut parameters = self.parameters.clone();
        parameters.timeline = Some(breakpoints);
        let rates = parameters.resolve()?;

        let current = &self.rates.timeline;
        let k = current.interval_count();
        if rates.timeline.interval_count() != k
            || (k > 1 && rates.timeline.is_ascending() != current.is_ascending())
        {
            return Err(EngineError::TimelineShapeChanged { expected: k });
        }

        self.commit_parameters(parameters, rates);
        self.mark_dirty(ParameterKind::Timeline);
        Ok(())
    }

    fn replace_parameters(&mut self, parameters: RateParameters, kind: ParameterKind) -> EngineResult<()> {
        let rates = parameters.resolve()?;
        self.commit_parameters(parameters, rates);
        self.mark_dirty(kind);
        Ok(())
    }

    fn commit_parameters(&mut self, parameters: RateParameters, rates: ResolvedRates) {
        let previous_parameters = std::mem::replace(&mut self.parameters, parameters);
        let previous_rates = std::mem::replace(&mut self.rates, rates);
        self.snapshot
            .parameters
            .get_or_insert((previous_parameters, previous_rates));
    }

    /// Invalidate the interval cache. Every parameter kind forces a full
    /// rebuild.
    pub fn mark_dirty(&mut self, kind: ParameterKind) {
        trace!(parameter = ?kind, "interval cache invalidated");
        self.intervals_dirty = true;
    }

    /// Recompute every overlap count from scratch on the next refresh.
    pub fn force_overlap_refresh(&mut self) {
        self.overlap_full_refresh = true;
    }

    // ---------------------------------------------------------------
    // Evaluation
    // ---------------------------------------------------------------

    /// Log-likelihood of the current state, or `NEG_INFINITY`.
    pub fn evaluate(&mut self) -> f64 {
        self.evaluate_detailed().total
    }

    /// Log-likelihood of the current state with its components.
    pub fn evaluate_detailed(&mut self) -> LikelihoodBreakdown {
        self.refresh();
        let breakdown = LikelihoodInputs {
            intervals: &self.intervals,
            overlap: &self.overlap,
            observations: &self.observations,
            condition: self.condition,
        }
        .evaluate(&self.ranges);
        trace!(total = breakdown.total, "likelihood evaluated");
        breakdown
    }

    fn refresh(&mut self) {
        if self.intervals_dirty {
            self.intervals.rebuild(&self.rates);
            self.intervals_dirty = false;
        }

        if self.overlap_full_refresh {
            self.overlap.recompute_all(&self.ranges);
            self.overlap_full_refresh = false;
            debug!(ranges = self.ranges.len(), "overlap counts fully refreshed");
        } else if self.overlap.dirty_count() > 0 {
            self.overlap.update_dirty(&self.ranges);
        }
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    /// Accept the current state: bring both caches up to date, then clear every
    /// dirty flag and drop the rollback snapshot.
    pub fn keep(&mut self) {
        self.refresh();
        self.overlap.clear_dirty();
        self.snapshot = Snapshot::default();
    }

    /// Reject the current state and return to the one at the last keep.
    ///
    /// Rolled-back ranges stay dirty so the next refresh re-diffs them against
    /// the relation matrix, and the interval cache is rebuilt from the restored
    /// parameters. The next evaluation reproduces the accepted result exactly.
    pub fn restore(&mut self) {
        if self.snapshot.is_empty() {
            return;
        }
        let snapshot = std::mem::take(&mut self.snapshot);

        let restored_ranges = snapshot.ranges.len();
        for (index, range) in snapshot.ranges {
            self.ranges[index] = range;
            self.overlap.mark_dirty(index);
        }

        let restored_parameters = snapshot.parameters.is_some();
        if let Some((parameters, rates)) = snapshot.parameters {
            self.parameters = parameters;
            self.rates = rates;
            self.intervals_dirty = true;
        }

        debug!(
            ranges = restored_ranges,
            parameters = restored_parameters,
            "restored accepted state"
        );
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    /// Overlap count of range `index` as of the last refresh.
    pub fn overlap_count(&self, index: usize) -> usize {
        self.overlap.count(index)
    }

    /// Internal index of the interval containing `t` under the current
    /// parameters.
    pub fn interval_index_for_time(&self, t: f64) -> usize {
        self.rates.timeline.interval_index(t)
    }

    pub fn interval_count(&self) -> usize {
        self.rates.interval_count()
    }

    pub fn origination_rate(&self, interval: usize) -> f64 {
        self.rates.origination[interval]
    }

    pub fn termination_rate(&self, interval: usize) -> f64 {
        self.rates.termination[interval]
    }

    pub fn sampling_rate(&self, interval: usize) -> f64 {
        self.rates.sampling[interval]
    }

    pub fn boundary_sampling(&self) -> f64 {
        self.rates.boundary_sampling
    }

    /// Younger bound of `interval`.
    pub fn interval_time(&self, interval: usize) -> f64 {
        self.rates.timeline.lower_bound(interval)
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn range(&self, index: usize) -> Option<&Range> {
        self.ranges.get(index)
    }

    pub fn parameters(&self) -> &RateParameters {
        &self.parameters
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    /// Whether any mutation is waiting for keep or restore.
    pub fn has_pending_changes(&self) -> bool {
        !self.snapshot.is_empty()
    }
}

fn check_range_times(index: usize, range: &Range) -> Result<(), ConfigError> {
    let fields = [
        ("start", range.start),
        ("end", range.end),
        ("first_observed", range.first_observed),
        ("last_observed", range.last_observed),
    ];
    for (name, value) in fields {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: format!("ranges[{}].{}", index, name),
                message: format!("Must be finite and >= 0, got {}", value),
            });
        }
    }
    Ok(())
}
