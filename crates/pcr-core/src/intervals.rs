//! Interval-indexed cache of rates and renewal boundary values.
//!
//! Each interval `i` (internal order, 0 = oldest, `k - 1` = boundary interval)
//! carries its rates and three values taken at its older bound: the extinction
//! probability `p_i`, the observation probability `q_i` and its decayed variant
//! `q̃_i`. These feed the likelihood as transition factors for ranges that cross
//! interval bounds, and `p_{i+1}` is the boundary condition that solves interval
//! `i`. The cache is therefore rebuilt in one backward pass from the boundary
//! interval to the oldest.

use pcr_config::{ResolvedRates, Timeline};
use pcr_math::{IntervalRates, RenewalSolution};
use tracing::debug;

/// Per-interval rates, solved renewal constants and carried boundary values.
#[derive(Debug, Clone)]
pub struct IntervalCache {
    timeline: Timeline,
    boundary_sampling: f64,
    solutions: Vec<RenewalSolution>,
    /// p at the older bound of each interval; entry `k` is the value 1 carried
    /// into the boundary interval.
    extinction: Vec<f64>,
    /// q at the older bound of each interval.
    observation: Vec<f64>,
    /// q̃ at the older bound of each interval.
    observation_tilde: Vec<f64>,
}

impl IntervalCache {
    /// Build and fill the cache for a set of resolved rates.
    pub fn new(rates: &ResolvedRates) -> Self {
        let mut cache = Self {
            timeline: rates.timeline.clone(),
            boundary_sampling: rates.boundary_sampling,
            solutions: Vec::new(),
            extinction: Vec::new(),
            observation: Vec::new(),
            observation_tilde: Vec::new(),
        };
        cache.rebuild(rates);
        cache
    }

    /// Recompute every interval from scratch.
    pub fn rebuild(&mut self, rates: &ResolvedRates) {
        let k = rates.interval_count();
        self.timeline = rates.timeline.clone();
        self.boundary_sampling = rates.boundary_sampling;

        self.extinction.clear();
        self.extinction.resize(k + 1, 1.0);
        self.observation.clear();
        self.observation.resize(k + 1, 1.0);
        self.observation_tilde.clear();
        self.observation_tilde.resize(k + 1, 1.0);

        let mut solutions = Vec::with_capacity(k);
        for i in (0..k).rev() {
            let interval_rates = IntervalRates::new(
                rates.origination[i],
                rates.termination[i],
                rates.sampling[i],
            );
            let rho = if i == k - 1 { rates.boundary_sampling } else { 0.0 };
            let solution = RenewalSolution::new(interval_rates, rho, self.extinction[i + 1]);

            if i > 0 {
                let dt = self.timeline.lower_bound(i - 1) - self.timeline.lower_bound(i);
                self.observation[i] = solution.observation_probability(dt);
                self.observation_tilde[i] = solution.observation_probability_tilde(dt);
                self.extinction[i] = solution.extinction_probability(dt);
            }
            solutions.push(solution);
        }
        solutions.reverse();
        self.solutions = solutions;

        debug!(
            intervals = k,
            boundary_sampling = self.boundary_sampling,
            "interval cache rebuilt"
        );
    }

    pub fn interval_count(&self) -> usize {
        self.solutions.len()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Index of the interval containing `t`.
    pub fn interval_index(&self, t: f64) -> usize {
        self.timeline.interval_index(t)
    }

    /// Younger bound of interval `i`.
    pub fn interval_time(&self, i: usize) -> f64 {
        self.timeline.lower_bound(i)
    }

    pub fn origination(&self, i: usize) -> f64 {
        self.solutions[i].rates().origination
    }

    pub fn termination(&self, i: usize) -> f64 {
        self.solutions[i].rates().termination
    }

    pub fn sampling(&self, i: usize) -> f64 {
        self.solutions[i].rates().sampling
    }

    pub fn boundary_sampling(&self) -> f64 {
        self.boundary_sampling
    }

    /// q at the older bound of interval `i` (1 for the oldest interval).
    pub fn carried_observation(&self, i: usize) -> f64 {
        self.observation[i]
    }

    /// q̃ at the older bound of interval `i` (1 for the oldest interval).
    pub fn carried_observation_tilde(&self, i: usize) -> f64 {
        self.observation_tilde[i]
    }

    /// p at the older bound of interval `i` (1 past the boundary interval).
    pub fn carried_extinction(&self, i: usize) -> f64 {
        self.extinction[i]
    }

    fn elapsed(&self, i: usize, t: f64) -> f64 {
        assert!(
            t >= self.timeline.lower_bound(i) && t <= self.timeline.upper_bound(i),
            "time {} outside interval {}",
            t,
            i
        );
        t - self.timeline.lower_bound(i)
    }

    /// Extinction probability p_i(t): a lineage alive at `t` leaves no sampled
    /// trace.
    pub fn survival_value(&self, i: usize, t: f64) -> f64 {
        if t == 0.0 {
            return 1.0;
        }
        self.solutions[i].extinction_probability(self.elapsed(i, t))
    }

    /// Observation probability q_i(t), or q̃_i(t) when `tilde` is set.
    pub fn sample_density(&self, i: usize, t: f64, tilde: bool) -> f64 {
        if t == 0.0 {
            return 1.0;
        }
        let dt = self.elapsed(i, t);
        if tilde {
            self.solutions[i].observation_probability_tilde(dt)
        } else {
            self.solutions[i].observation_probability(dt)
        }
    }

    /// Closed-form antiderivative of the sampling decay within interval `i`.
    pub fn integral_of_sampling_decay(&self, i: usize, t: f64) -> f64 {
        self.solutions[i].integrate_sampling_decay(self.elapsed(i, t))
    }

    /// Probability that a process started at `t` is observed at least once.
    pub fn survival_probability(&self, t: f64) -> f64 {
        1.0 - self.survival_value(self.interval_index(t), t)
    }
}
