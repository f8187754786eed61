//! Closed-form solutions of the per-interval renewal equations.
//!
//! Within one interval the origination rate λ, termination rate μ and sampling
//! rate ψ are constant. The extinction probability p(t), the observation
//! probability q(t) and the decayed variant q̃(t) then have closed forms in the
//! elapsed time `dt` since the interval's younger bound:
//!
//! ```text
//! A    = sqrt((λ - μ - ψ)² + 4λψ)
//! B    = ((1 - 2(1 - ρ)·p₊)·λ + μ + ψ) / A
//! e    = exp(-A·dt)
//! q    = 4e / ((1 + B) + e(1 - B))²
//! q̃    = sqrt(q · exp(-(λ + μ + ψ)·dt))
//! p    = (λ + μ + ψ - A·((1 + B) - e(1 - B)) / ((1 + B) + e(1 - B))) / 2λ
//! ```
//!
//! where p₊ is the extinction probability carried in from the next younger
//! interval (1 for the boundary interval) and ρ is the instantaneous sampling
//! probability, non-zero only for the boundary interval.

use serde::{Deserialize, Serialize};

/// Rates that are constant within a single interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalRates {
    /// Origination rate (λ).
    pub origination: f64,
    /// Termination rate (μ).
    pub termination: f64,
    /// Sampling rate (ψ).
    pub sampling: f64,
}

impl IntervalRates {
    pub fn new(origination: f64, termination: f64, sampling: f64) -> Self {
        Self {
            origination,
            termination,
            sampling,
        }
    }

    /// λ + μ + ψ, the total event rate.
    pub fn total(&self) -> f64 {
        self.origination + self.termination + self.sampling
    }
}

/// The solved constants of one interval, ready for point evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenewalSolution {
    rates: IntervalRates,
    /// Discriminant term A.
    discriminant: f64,
    /// Weighting term B.
    weighting: f64,
}

impl RenewalSolution {
    /// Solve an interval given the boundary sampling probability that applies to
    /// it and the extinction probability carried from the next younger interval.
    pub fn new(rates: IntervalRates, boundary_sampling: f64, carried_extinction: f64) -> Self {
        let IntervalRates {
            origination: lambda,
            termination: mu,
            sampling: psi,
        } = rates;

        let spread = lambda - mu - psi;
        let discriminant = (spread * spread + 4.0 * lambda * psi).sqrt();
        let weighting =
            ((1.0 - 2.0 * (1.0 - boundary_sampling) * carried_extinction) * lambda + mu + psi) / discriminant;

        Self {
            rates,
            discriminant,
            weighting,
        }
    }

    pub fn rates(&self) -> IntervalRates {
        self.rates
    }

    pub fn discriminant(&self) -> f64 {
        self.discriminant
    }

    pub fn weighting(&self) -> f64 {
        self.weighting
    }

    /// exp(-A·dt)
    fn decay(&self, dt: f64) -> f64 {
        (-self.discriminant * dt).exp()
    }

    /// Extinction probability p after `dt` time units into the interval.
    pub fn extinction_probability(&self, dt: f64) -> f64 {
        let a = self.discriminant;
        let b = self.weighting;
        let e = self.decay(dt);
        let numerator = self.rates.total() - a * ((1.0 + b) - e * (1.0 - b)) / ((1.0 + b) + e * (1.0 - b));
        numerator / (2.0 * self.rates.origination)
    }

    /// Observation probability q after `dt` time units into the interval.
    pub fn observation_probability(&self, dt: f64) -> f64 {
        let b = self.weighting;
        let e = self.decay(dt);
        let denom = (1.0 + b) + e * (1.0 - b);
        4.0 * e / (denom * denom)
    }

    /// Observation probability discounted by the total-rate decay, q̃.
    pub fn observation_probability_tilde(&self, dt: f64) -> f64 {
        let q = self.observation_probability(dt);
        (q * (-self.rates.total() * dt).exp()).sqrt()
    }

    /// Antiderivative of exp(ψ·t)·q̃(t)/q(t), evaluated `dt` into the interval.
    ///
    /// Differences of this function integrate the sampling decay over a sub-span
    /// of one interval without quadrature.
    pub fn integrate_sampling_decay(&self, dt: f64) -> f64 {
        let a = self.discriminant;
        let b = self.weighting;
        let e = self.decay(dt);
        let net = self.rates.origination + self.rates.termination - self.rates.sampling;
        let bracket = (1.0 + b) / (a - net) - e * (1.0 - b) / (a + net);
        (-(net - a) * dt / 2.0).exp() * bracket
    }
}
