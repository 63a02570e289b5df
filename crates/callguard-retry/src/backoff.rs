//! Exponential backoff with additive jitter.

use std::time::Duration;

/// Pre-jitter delay after the failed attempt `attempt` (0-indexed):
/// `min(initial * multiplier^attempt, max)`.
pub(crate) fn exponential(
    initial: Duration,
    multiplier: f64,
    max: Duration,
    attempt: usize,
) -> Duration {
    let exponent = attempt.min(i32::MAX as usize) as i32;
    let secs = initial.as_secs_f64() * multiplier.powi(exponent);
    if !secs.is_finite() || secs >= max.as_secs_f64() {
        max
    } else {
        Duration::from_secs_f64(secs).min(max)
    }
}

/// Adds `base * factor * sample` on top of `base`. `sample` is in `[0, 1)`,
/// so the result is never shorter than `base`.
pub(crate) fn with_jitter(base: Duration, factor: f64, sample: f64) -> Duration {
    if factor <= 0.0 {
        return base;
    }
    base.saturating_add(base.mul_f64(factor * sample))
}
