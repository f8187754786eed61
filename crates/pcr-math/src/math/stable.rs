//! Numerically stable primitives for log-domain likelihood terms.

/// Stable log(1 - exp(x)) for x <= 0.
///
/// Returns NEG_INFINITY at x == 0 and NaN for positive x.
pub fn log1m_exp(x: f64) -> f64 {
    if x.is_nan() || x > 0.0 {
        return f64::NAN;
    }
    if x == 0.0 {
        return f64::NEG_INFINITY;
    }
    if x > -std::f64::consts::LN_2 {
        (-x.exp_m1()).ln()
    } else {
        (-x.exp()).ln_1p()
    }
}

/// `count * ln(rate)`, defined as 0 when `count` is 0.
///
/// Keeps a zero rate with zero observations finite.
pub fn count_log_rate(count: u64, rate: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    count as f64 * rate.ln()
}

/// Log-probability contribution of `hits` successes and `misses` failures of a
/// single Bernoulli probability.
///
/// A term is omitted entirely when its probability is exactly 0 (hits) or exactly
/// 1 (misses), mirroring how boundary sampling is scored.
pub fn bernoulli_log_terms(hits: usize, misses: usize, p: f64) -> f64 {
    let mut out = 0.0;
    if p > 0.0 {
        out += hits as f64 * p.ln();
    }
    if p < 1.0 {
        out += misses as f64 * (-p).ln_1p();
    }
    out
}

/// Natural log that maps non-positive arguments to NEG_INFINITY instead of NaN.
pub fn ln_nonneg(x: f64) -> f64 {
    if x > 0.0 {
        x.ln()
    } else if x == 0.0 {
        f64::NEG_INFINITY
    } else {
        f64::NAN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol
    }

    #[test]
    fn log1m_exp_matches_naive_in_safe_range() {
        for x in [-0.01, -0.5, -1.0, -3.0, -20.0] {
            let naive = (1.0 - f64::exp(x)).ln();
            assert!(approx_eq(log1m_exp(x), naive, 1e-12), "x={}", x);
        }
    }

    #[test]
    fn log1m_exp_edges() {
        assert_eq!(log1m_exp(0.0), f64::NEG_INFINITY);
        assert!(log1m_exp(0.1).is_nan());
        assert!(log1m_exp(f64::NAN).is_nan());
        assert_eq!(log1m_exp(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn log1m_exp_tiny_argument_is_accurate() {
        let x = -1e-12;
        let expected = (1e-12f64).ln();
        assert!(approx_eq(log1m_exp(x), expected, 1e-6));
    }

    #[test]
    fn count_log_rate_zero_count_is_zero() {
        assert_eq!(count_log_rate(0, 0.0), 0.0);
        assert_eq!(count_log_rate(0, 3.0), 0.0);
    }

    #[test]
    fn count_log_rate_scales_with_count() {
        assert!(approx_eq(count_log_rate(3, 0.2), 3.0 * 0.2f64.ln(), 1e-12));
        assert_eq!(count_log_rate(2, 0.0), f64::NEG_INFINITY);
    }

    #[test]
    fn bernoulli_terms_skip_degenerate_probabilities() {
        assert_eq!(bernoulli_log_terms(4, 0, 1.0), 0.0);
        assert_eq!(bernoulli_log_terms(0, 4, 0.0), 0.0);
        // p == 0 drops the hit term; misses score ln(1) = 0
        assert_eq!(bernoulli_log_terms(2, 3, 0.0), 0.0);
        let expected = 2.0 * 0.25f64.ln() + 3.0 * 0.75f64.ln();
        assert!(approx_eq(bernoulli_log_terms(2, 3, 0.25), expected, 1e-12));
    }

    #[test]
    fn ln_nonneg_edges() {
        assert_eq!(ln_nonneg(0.0), f64::NEG_INFINITY);
        assert!(ln_nonneg(-1.0).is_nan());
        assert!(approx_eq(ln_nonneg(std::f64::consts::E), 1.0, 1e-15));
    }
}
