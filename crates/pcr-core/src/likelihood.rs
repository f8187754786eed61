//! Log-likelihood of a set of ranges under the piecewise-constant process.
//!
//! # Terms
//!
//! For every range with start b, end d, first observation o and last
//! observation y (intervals written as l(·)):
//!
//! ```text
//! ln λ_l(b) + ln max(γ, 1) + ln q_l(b)(b)
//!   + Σ_{l(b) ≤ j < l(o)} ln q_{j+1}
//!   + ln q̃_l(o)(o) - ln q_l(o)(o)
//!   + Σ_{l(o) ≤ j < l(d)} ln q̃_{j+1}
//!   - ln q̃_l(d)(d)
//!   + ln μ_l(d)                      (only when d > 0)
//! ```
//!
//! where γ is the range's overlap count. On top of that come the boundary
//! sampling terms, the observation-count terms of the active data regime, a
//! correction removing the origination density of the oldest range (the origin
//! is not an origination event), and optionally conditioning on survival.
//!
//! Invalid range orderings make the likelihood zero; the result is then
//! `NEG_INFINITY`, as is any non-finite total.

use crate::intervals::IntervalCache;
use crate::observations::{ObservationModel, PresenceData};
use crate::overlap::OverlapCache;
use pcr_config::{Condition, Range};
use pcr_math::{bernoulli_log_terms, count_log_rate, ln_nonneg, log1m_exp};
use serde::Serialize;
use tracing::debug;

/// Components of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LikelihoodBreakdown {
    /// Sum of the per-range terms.
    pub ranges: f64,
    /// Sampled / unsampled extant range terms.
    pub boundary_sampling: f64,
    /// Observation-count (or presence/absence) terms.
    pub observations: f64,
    /// Removal of the origin's origination density.
    pub origin_correction: f64,
    /// Survival conditioning (0 when unconditioned).
    pub conditioning: f64,
    /// Total log-likelihood.
    pub total: f64,
    /// First range that violated its ordering constraints, if any.
    pub rejected_range: Option<usize>,
}

impl LikelihoodBreakdown {
    fn impossible(rejected_range: Option<usize>) -> Self {
        Self {
            ranges: 0.0,
            boundary_sampling: 0.0,
            observations: 0.0,
            origin_correction: 0.0,
            conditioning: 0.0,
            total: f64::NEG_INFINITY,
            rejected_range,
        }
    }

    pub fn is_impossible(&self) -> bool {
        self.total == f64::NEG_INFINITY
    }
}

/// Read-only view of everything an evaluation needs.
#[derive(Debug, Clone, Copy)]
pub struct LikelihoodInputs<'a> {
    pub intervals: &'a IntervalCache,
    pub overlap: &'a OverlapCache,
    pub observations: &'a ObservationModel,
    pub condition: Condition,
}

/// Scratch accumulators filled while scanning ranges.
struct IntervalAccumulators {
    /// Marginalized: number of first/last observations per interval.
    observed: Vec<u64>,
    /// Marginalized: exposure time; presence/absence: log-probability mass.
    mass: Vec<f64>,
}

impl<'a> LikelihoodInputs<'a> {
    /// Evaluate the log-likelihood of `ranges`.
    pub fn evaluate(&self, ranges: &[Range]) -> LikelihoodBreakdown {
        let cache = self.intervals;
        let k = cache.interval_count();
        let presence = self.observations.presence();

        let mut acc = IntervalAccumulators {
            observed: vec![0; k],
            mass: vec![0.0; k],
        };

        let mut range_total = 0.0;
        let mut extant_sampled = 0usize;
        let mut extant_unsampled = 0usize;
        let mut oldest_start = 0.0;
        let mut oldest_rate = 0.0;

        for (idx, range) in ranges.iter().enumerate() {
            let term = match presence {
                Some(data) => self.presence_range_term(idx, range, data, &mut acc),
                None => self.count_range_term(idx, range, &mut acc),
            };
            let Some(term) = term else {
                debug!(range = idx, start = range.start, end = range.end, "range ordering violated");
                return LikelihoodBreakdown::impossible(Some(idx));
            };

            range_total += term;
            if !range_total.is_finite() {
                debug!(range = idx, "non-finite range term");
                return LikelihoodBreakdown::impossible(None);
            }

            if range.is_extant() {
                if range.last_observed == 0.0 {
                    extant_sampled += 1;
                } else {
                    extant_unsampled += 1;
                }
            }

            if range.start > oldest_start {
                oldest_start = range.start;
                oldest_rate = cache.origination(cache.interval_index(range.start));
            }
        }

        let boundary_sampling =
            bernoulli_log_terms(extant_sampled, extant_unsampled, cache.boundary_sampling());
        let observations = self.observation_terms(&acc);
        let origin_correction = -ln_nonneg(oldest_rate);
        let conditioning = match self.condition {
            Condition::None => 0.0,
            Condition::Survival => -cache.survival_probability(oldest_start).ln(),
        };

        let total = range_total + boundary_sampling + observations + origin_correction + conditioning;
        if !total.is_finite() {
            return LikelihoodBreakdown::impossible(None);
        }

        LikelihoodBreakdown {
            ranges: range_total,
            boundary_sampling,
            observations,
            origin_correction,
            conditioning,
            total,
            rejected_range: None,
        }
    }

    /// Terms shared by every regime from the start down to the first observation
    /// interval `first`.
    fn origination_terms(&self, idx: usize, start: f64, bi: usize, first: usize) -> f64 {
        let cache = self.intervals;
        let mut term = cache.origination(bi).ln();
        term += (self.overlap.count(idx).max(1) as f64).ln();
        term += cache.sample_density(bi, start, false).ln();
        for j in bi..first {
            term += cache.carried_observation(j + 1).ln();
        }
        term
    }

    /// Terms from the first observation interval `first` down to the end.
    fn termination_terms(&self, end: f64, first: usize, di: usize) -> f64 {
        let cache = self.intervals;
        let mut term = 0.0;
        for j in first..di {
            term += cache.carried_observation_tilde(j + 1).ln();
        }
        term -= cache.sample_density(di, end, true).ln();
        if end > 0.0 {
            term += cache.termination(di).ln();
        }
        term
    }

    /// Per-range term for count data (exact or marginalized). `None` when the
    /// range's times are out of order.
    fn count_range_term(&self, idx: usize, range: &Range, acc: &mut IntervalAccumulators) -> Option<f64> {
        let &Range {
            start: b,
            end: d,
            first_observed: o,
            last_observed: y,
        } = range;

        let ordered = b > o && o >= y && (y > d || (y == d && y == 0.0)) && d >= 0.0;
        if !ordered {
            return None;
        }

        let cache = self.intervals;
        let bi = cache.interval_index(b);
        let di = cache.interval_index(d);
        let oi = cache.interval_index(o);
        let yi = cache.interval_index(y);

        let mut term = self.origination_terms(idx, b, bi, oi);
        term += cache.sample_density(oi, o, true).ln() - cache.sample_density(oi, o, false).ln();
        term += self.termination_terms(d, oi, di);

        if self.observations.is_marginalized() {
            if o > 0.0 {
                acc.observed[oi] += 1;
            }
            if o != y && y > 0.0 {
                acc.observed[yi] += 1;
            }

            if oi == yi {
                acc.mass[oi] += o - y;
            } else {
                acc.mass[oi] += o - cache.interval_time(oi);
                for j in oi + 1..yi {
                    acc.mass[j] += cache.interval_time(j - 1) - cache.interval_time(j);
                }
                acc.mass[yi] += cache.interval_time(yi - 1) - y;
            }
        }

        Some(term)
    }

    /// Per-range term for presence/absence data. `None` when the range's times
    /// are out of order, end before its youngest presence, or start after its
    /// oldest presence.
    fn presence_range_term(
        &self,
        idx: usize,
        range: &Range,
        data: &PresenceData,
        acc: &mut IntervalAccumulators,
    ) -> Option<f64> {
        let &Range {
            start: b,
            end: d,
            last_observed: y,
            ..
        } = range;
        let span = data.span(idx);
        let cache = self.intervals;

        let extant_sampled = y == 0.0 && d == 0.0;
        if !(b > d && (extant_sampled || (y != 0.0 && d >= 0.0))) {
            return None;
        }

        let bi = cache.interval_index(b);
        let di = cache.interval_index(d);
        if span.oldest < bi || span.youngest > di {
            return None;
        }

        let mut term = self.origination_terms(idx, b, bi, span.oldest);
        term += self.termination_terms(d, span.oldest, di);

        self.accumulate_presence(idx, b, d, bi, di, data, &mut acc.mass);

        Some(term)
    }

    /// Add the log-probability of the observed presence pattern of one range.
    #[allow(clippy::too_many_arguments)]
    fn accumulate_presence(
        &self,
        idx: usize,
        b: f64,
        d: f64,
        bi: usize,
        di: usize,
        data: &PresenceData,
        mass: &mut [f64],
    ) {
        let cache = self.intervals;
        let integral = |i: usize, t: f64| cache.integral_of_sampling_decay(i, t);
        let psi = |i: usize| cache.sampling(i);
        let time = |i: usize| cache.interval_time(i);

        if bi == di {
            if data.is_present(idx, bi) {
                mass[bi] += (integral(bi, b) - integral(di, d)).ln() + psi(bi).ln() - psi(di) * (d - time(di));
            }
            return;
        }

        let mut first = true;

        if data.is_present(idx, bi) {
            mass[bi] += (integral(bi, b) - integral(bi, time(bi))).ln() + psi(bi).ln();
            first = false;
        }

        for j in bi + 1..di {
            if !data.is_present(idx, j) {
                continue;
            }
            if first {
                mass[j] += (integral(j, time(j - 1)) - integral(j, time(j))).ln() + psi(j).ln();
                first = false;
            } else {
                let span = time(j - 1) - time(j);
                mass[j] += psi(j) * span + log1m_exp(-span * psi(j));
            }
        }

        if data.is_present(idx, di) {
            if first {
                mass[di] += (integral(di, time(di - 1)) - integral(di, d)).ln() + psi(di).ln()
                    - psi(di) * (d - time(di));
            } else {
                let span = time(di - 1) - d;
                mass[di] += psi(di) * span + log1m_exp(-span * psi(di));
            }
        }
    }

    /// Per-interval observation terms for the active regime.
    fn observation_terms(&self, acc: &IntervalAccumulators) -> f64 {
        let cache = self.intervals;
        let k = cache.interval_count();
        match self.observations {
            ObservationModel::PresenceAbsence(_) => acc.mass.iter().sum(),
            ObservationModel::Marginalized => (0..k)
                .map(|i| cache.sampling(i) * acc.mass[i] + count_log_rate(acc.observed[i], cache.sampling(i)))
                .sum(),
            ObservationModel::IntervalTotals(counts) => (0..k)
                .map(|i| count_log_rate(counts[i], cache.sampling(i)))
                .sum(),
            ObservationModel::Total(count) => count_log_rate(*count, cache.sampling(k - 1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcr_config::{DataRegime, RateParameters, ResolvedRates};

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol.max(tol * a.abs().max(b.abs()))
    }

    fn rates(timeline: Option<Vec<f64>>, rho: f64) -> ResolvedRates {
        RateParameters {
            origination: 1.0.into(),
            termination: 0.5.into(),
            sampling: 0.2.into(),
            boundary_sampling: rho,
            timeline,
        }
        .resolve()
        .unwrap()
    }

    fn evaluate(
        cache: &IntervalCache,
        ranges: &[Range],
        observations: &ObservationModel,
        condition: Condition,
    ) -> LikelihoodBreakdown {
        let overlap = OverlapCache::from_ranges(ranges);
        LikelihoodInputs {
            intervals: cache,
            overlap: &overlap,
            observations,
            condition,
        }
        .evaluate(ranges)
    }

    #[test]
    fn out_of_order_range_is_rejected_with_index() {
        let cache = IntervalCache::new(&rates(None, 1.0));
        let ranges = [Range::new(2.0, 0.0, 1.0, 0.0), Range::new(1.0, 1.5, 1.2, 1.2)];
        let out = evaluate(&cache, &ranges, &ObservationModel::Marginalized, Condition::None);
        assert!(out.is_impossible());
        assert_eq!(out.rejected_range, Some(1));
    }

    #[test]
    fn negative_end_is_rejected() {
        let cache = IntervalCache::new(&rates(None, 1.0));
        let ranges = [Range::new(2.0, -0.5, 1.0, 0.5)];
        let out = evaluate(&cache, &ranges, &ObservationModel::Marginalized, Condition::None);
        assert_eq!(out.total, f64::NEG_INFINITY);
    }

    #[test]
    fn start_must_exceed_first_observation() {
        let cache = IntervalCache::new(&rates(None, 1.0));
        let ranges = [Range::new(1.0, 0.0, 1.0, 0.0)];
        let out = evaluate(&cache, &ranges, &ObservationModel::Marginalized, Condition::None);
        assert!(out.is_impossible());
    }

    #[test]
    fn single_observation_matches_between_regimes() {
        // one observation at o = y > 0: marginalized exposure is zero and the
        // implied count is one
        let cache = IntervalCache::new(&rates(None, 1.0));
        let ranges = [Range::new(2.0, 0.5, 1.0, 1.0)];
        let marginal = evaluate(&cache, &ranges, &ObservationModel::Marginalized, Condition::None);
        let exact = evaluate(
            &cache,
            &ranges,
            &ObservationModel::IntervalTotals(vec![1]),
            Condition::None,
        );
        assert!(marginal.total.is_finite());
        assert!(approx_eq(marginal.total, exact.total, 1e-12));
    }

    #[test]
    fn components_sum_to_total() {
        let cache = IntervalCache::new(&rates(Some(vec![3.0, 1.0]), 0.5));
        let ranges = [
            Range::new(4.0, 0.0, 3.5, 0.0),
            Range::new(3.2, 0.0, 2.0, 0.5),
            Range::new(2.5, 0.4, 2.0, 0.8),
        ];
        let out = evaluate(&cache, &ranges, &ObservationModel::Marginalized, Condition::Survival);
        let sum = out.ranges + out.boundary_sampling + out.observations + out.origin_correction + out.conditioning;
        assert!(approx_eq(out.total, sum, 1e-12));
        assert!(out.conditioning > 0.0);
        assert!(out.rejected_range.is_none());
    }

    #[test]
    fn origin_correction_uses_oldest_start_interval() {
        let resolved = RateParameters {
            origination: vec![0.5, 2.0].into(),
            termination: 0.5.into(),
            sampling: 0.2.into(),
            boundary_sampling: 1.0,
            timeline: Some(vec![3.0]),
        }
        .resolve()
        .unwrap();
        let cache = IntervalCache::new(&resolved);
        // ascending single breakpoint: 2.0 applies to the oldest interval
        let ranges = [Range::new(4.0, 0.0, 3.5, 0.0), Range::new(2.0, 0.0, 1.0, 0.0)];
        let out = evaluate(&cache, &ranges, &ObservationModel::Marginalized, Condition::None);
        assert!(approx_eq(out.origin_correction, -(2.0f64.ln()), 1e-15));
    }

    #[test]
    fn boundary_sampling_partitions_extant_ranges() {
        let cache = IntervalCache::new(&rates(None, 0.25));
        let ranges = [
            Range::new(3.0, 0.0, 2.0, 0.0),
            Range::new(3.5, 0.0, 2.0, 0.0),
            Range::new(2.5, 0.0, 2.0, 1.0),
            Range::new(2.8, 0.5, 2.0, 1.0),
        ];
        let out = evaluate(&cache, &ranges, &ObservationModel::Marginalized, Condition::None);
        let expected = 2.0 * 0.25f64.ln() + 0.75f64.ln();
        assert!(approx_eq(out.boundary_sampling, expected, 1e-12));
    }

    #[test]
    fn total_count_scores_once() {
        let cache = IntervalCache::new(&rates(Some(vec![2.0, 1.0]), 1.0));
        let ranges = [Range::new(3.0, 0.0, 2.5, 0.0)];
        let out = evaluate(&cache, &ranges, &ObservationModel::Total(4), Condition::None);
        assert!(approx_eq(out.observations, 4.0 * 0.2f64.ln(), 1e-12));
    }

    #[test]
    fn interval_totals_score_each_interval() {
        let cache = IntervalCache::new(&rates(Some(vec![2.0]), 1.0));
        let ranges = [Range::new(3.0, 0.0, 2.5, 0.0)];
        let out = evaluate(
            &cache,
            &ranges,
            &ObservationModel::IntervalTotals(vec![2, 3]),
            Condition::None,
        );
        assert!(approx_eq(out.observations, 5.0 * 0.2f64.ln(), 1e-12));
    }

    #[test]
    fn marginalized_exposure_spans_intervals() {
        // o = 5 in interval 0, y = 0.5 in interval 2 with bounds 4 and 2
        let cache = IntervalCache::new(&rates(Some(vec![4.0, 2.0]), 1.0));
        let ranges = [Range::new(6.0, 0.0, 5.0, 0.5)];
        let out = evaluate(&cache, &ranges, &ObservationModel::Marginalized, Condition::None);
        // exposure 1 + 2 + 1.5 at ψ = 0.2, two observations
        let expected = 0.2 * 4.5 + 2.0 * 0.2f64.ln();
        assert!(approx_eq(out.observations, expected, 1e-12));
    }

    fn presence(rows: Vec<Vec<bool>>, k: usize) -> ObservationModel {
        ObservationModel::from_regime(DataRegime::PresenceAbsence(rows), k)
    }

    #[test]
    fn presence_single_interval_range() {
        let cache = IntervalCache::new(&rates(None, 1.0));
        let ranges = [Range::new(2.0, 0.5, 1.5, 1.0)];
        let out = evaluate(&cache, &ranges, &presence(vec![vec![true]], 1), Condition::None);
        assert!(out.total.is_finite());
        let expected = (cache.integral_of_sampling_decay(0, 2.0) - cache.integral_of_sampling_decay(0, 0.5)).ln()
            + 0.2f64.ln()
            - 0.2 * 0.5;
        assert!(approx_eq(out.observations, expected, 1e-12));
    }

    #[test]
    fn presence_absent_everywhere_adds_nothing() {
        let cache = IntervalCache::new(&rates(Some(vec![2.0]), 1.0));
        let ranges = [Range::new(3.0, 0.0, 2.5, 0.0)];
        let out = evaluate(&cache, &ranges, &presence(vec![vec![false, false]], 2), Condition::None);
        assert_eq!(out.observations, 0.0);
    }

    #[test]
    fn presence_spanning_intervals_is_finite() {
        let cache = IntervalCache::new(&rates(Some(vec![4.0, 2.0]), 1.0));
        let ranges = [Range::new(5.0, 0.5, 4.5, 1.0)];
        let out = evaluate(
            &cache,
            &ranges,
            &presence(vec![vec![true, true, true]], 3),
            Condition::None,
        );
        assert!(out.total.is_finite(), "{:?}", out);
        // first presence uses the integral, later ones the covered-span terms
        let psi: f64 = 0.2;
        let expected = (cache.integral_of_sampling_decay(0, 5.0) - cache.integral_of_sampling_decay(0, 4.0)).ln()
            + psi.ln()
            + (psi * 2.0 + log1m_exp(-psi * 2.0))
            + (psi * 1.5 + log1m_exp(-psi * 1.5));
        assert!(approx_eq(out.observations, expected, 1e-12));
    }

    #[test]
    fn presence_youngest_after_end_is_rejected() {
        // youngest presence in the boundary interval but the range ends in an older one
        let cache = IntervalCache::new(&rates(Some(vec![2.0]), 1.0));
        let ranges = [Range::new(4.0, 2.5, 3.0, 1.0)];
        let out = evaluate(&cache, &ranges, &presence(vec![vec![true, true]], 2), Condition::None);
        assert!(out.is_impossible());
        assert_eq!(out.rejected_range, Some(0));
    }

    #[test]
    fn presence_before_start_is_rejected() {
        // second range starts in the boundary interval but is present in the oldest one
        let cache = IntervalCache::new(&rates(Some(vec![4.0, 2.0]), 1.0));
        let ranges = [Range::new(5.0, 0.0, 4.5, 0.0), Range::new(1.5, 0.5, 1.0, 0.8)];
        let rows = vec![vec![true, false, true], vec![true, false, true]];
        let out = evaluate(&cache, &ranges, &presence(rows, 3), Condition::None);
        assert!(out.is_impossible());
        assert_eq!(out.rejected_range, Some(1));
    }

    #[test]
    fn presence_first_in_middle_interval() {
        let cache = IntervalCache::new(&rates(Some(vec![4.0, 2.0]), 1.0));
        let ranges = [Range::new(5.0, 0.5, 4.5, 1.0)];
        let out = evaluate(
            &cache,
            &ranges,
            &presence(vec![vec![false, true, true]], 3),
            Condition::None,
        );
        assert!(out.total.is_finite(), "{:?}", out);
        let psi: f64 = 0.2;
        let expected = (cache.integral_of_sampling_decay(1, 4.0) - cache.integral_of_sampling_decay(1, 2.0)).ln()
            + psi.ln()
            + (psi * 1.5 + log1m_exp(-psi * 1.5));
        assert!(approx_eq(out.observations, expected, 1e-12));
    }

    #[test]
    fn presence_first_in_end_interval() {
        let cache = IntervalCache::new(&rates(Some(vec![4.0, 2.0]), 1.0));
        let ranges = [Range::new(5.0, 0.5, 4.5, 1.0)];
        let out = evaluate(
            &cache,
            &ranges,
            &presence(vec![vec![false, false, true]], 3),
            Condition::None,
        );
        assert!(out.total.is_finite(), "{:?}", out);
        let psi: f64 = 0.2;
        let expected = (cache.integral_of_sampling_decay(2, 2.0) - cache.integral_of_sampling_decay(2, 0.5)).ln()
            + psi.ln()
            - psi * 0.5;
        assert!(approx_eq(out.observations, expected, 1e-12));
    }

    #[test]
    fn breakdown_serializes() {
        let cache = IntervalCache::new(&rates(None, 1.0));
        let ranges = [Range::new(2.0, 0.0, 1.0, 0.0)];
        let out = evaluate(&cache, &ranges, &ObservationModel::IntervalTotals(vec![0]), Condition::None);
        let json = serde_json::to_value(out).unwrap();
        assert!(json["total"].is_number());
        assert!(json["rejected_range"].is_null());
    }
}
