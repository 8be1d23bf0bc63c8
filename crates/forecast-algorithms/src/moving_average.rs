use forecast_core::{check_horizon, ForecastError};

use crate::{ensure_finite, require_len};

/// Simple Moving Average forecast.
///
/// Each step is the mean of the trailing `window` values, where earlier
/// forecast steps are appended to the series before computing the next one.
pub fn simple_moving_average(
    values: &[f64],
    window: usize,
    horizon: usize,
) -> Result<Vec<f64>, ForecastError> {
    if window == 0 {
        return Err(ForecastError::InvalidConfig(
            "windowSize must be positive".to_string(),
        ));
    }
    check_horizon(horizon)?;
    require_len(values, window)?;

    // Only the last `window` values ever matter.
    let mut tail: Vec<f64> = values[values.len() - window..].to_vec();
    let mut result = Vec::with_capacity(horizon);

    for _ in 0..horizon {
        let next = tail.iter().sum::<f64>() / window as f64;
        result.push(next);
        tail.remove(0);
        tail.push(next);
    }

    ensure_finite(result)
}

/// Exponentially Weighted Moving Average forecast.
///
/// The level starts at the first value and is updated with
/// `L = alpha * v + (1 - alpha) * L`; every horizon step returns the final level.
pub fn exponential_weighted_moving_average(
    values: &[f64],
    alpha: f64,
    horizon: usize,
) -> Result<Vec<f64>, ForecastError> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(ForecastError::InvalidConfig(format!(
            "alpha must be in (0, 1), got {}",
            alpha
        )));
    }
    check_horizon(horizon)?;
    require_len(values, 1)?;

    let level = smoothed_level(values, alpha);
    ensure_finite(vec![level; horizon])
}

/// Final EWMA level over `values`. Returns 0.0 for an empty slice.
pub fn smoothed_level(values: &[f64], alpha: f64) -> f64 {
    let mut iter = values.iter();
    let mut level = match iter.next() {
        Some(first) => *first,
        None => return 0.0,
    };
    for v in iter {
        level = alpha * v + (1.0 - alpha) * level;
    }
    level
}
