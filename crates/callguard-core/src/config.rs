//! Configuration validation shared by every builder.

use std::time::Duration;

/// A configuration value was rejected at construction time.
///
/// Builders never clamp out-of-range values; they fail with this error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid configuration for `{field}`: {reason}")]
pub struct ConfigError {
    /// Name of the offending setting.
    pub field: &'static str,
    /// Human-readable reason.
    pub reason: String,
}

impl ConfigError {
    /// Creates a new configuration error.
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Requires `value >= 1`.
pub fn require_positive(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::new(field, "must be at least 1"));
    }
    Ok(())
}

/// Requires a strictly positive duration.
pub fn require_nonzero_duration(field: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::new(field, "must be greater than zero"));
    }
    Ok(())
}

/// Requires a finite float within `[min, max]`.
pub fn require_in_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::new(
            field,
            format!("must be within [{min}, {max}], got {value}"),
        ));
    }
    Ok(())
}
