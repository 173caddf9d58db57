//! Log-space probability arithmetic
//!
//! All scores in the engine are natural-log probabilities. `-inf` is the
//! log of zero and must survive every operation without producing NaN.

/// log(0)
pub const LOG_ZERO: f64 = f64::NEG_INFINITY;

/// log(1)
pub const LOG_ONE: f64 = 0.0;

/// Add two log-space values: `ln(e^a + e^b)`.
#[inline]
pub fn log_add(a: f64, b: f64) -> f64 {
    if a == LOG_ZERO {
        return b;
    }
    if b == LOG_ZERO {
        return a;
    }
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// `ln(sum(e^x))` over a slice, stable for large magnitudes.
///
/// Returns [`LOG_ZERO`] for an empty slice or when every entry is `-inf`.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(LOG_ZERO, f64::max);
    if max == LOG_ZERO {
        return LOG_ZERO;
    }
    if max.is_infinite() {
        return max;
    }
    let sum: f64 = values.iter().map(|&v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Log probability of each outcome of a uniform distribution over `n` outcomes.
#[inline]
pub fn log_uniform(n: usize) -> f64 {
    -(n.max(1) as f64).ln()
}
