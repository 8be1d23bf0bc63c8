use forecast_core::{check_horizon, ForecastError};

use crate::regression::fit_line;
use crate::{ensure_finite, require_len};

/// Additive decomposition of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    /// Index of the first trend value in the original series.
    pub trend_offset: usize,
    /// Centered moving average, defined on `trend_offset..trend_offset + trend.len()`.
    pub trend: Vec<f64>,
    /// Mean-zero seasonal index, one entry per position in the season.
    pub seasonal_index: Vec<f64>,
}

/// Centered moving average of width `period`.
///
/// Even periods use the 2xm form (half weight on both ends) so the window
/// stays centred on an observation.
pub fn centered_moving_average(values: &[f64], period: usize) -> (usize, Vec<f64>) {
    let half = period / 2;
    if period == 0 || values.len() < 2 * half + 1 {
        return (half, Vec::new());
    }

    let trend = (half..values.len() - half)
        .map(|i| {
            if period % 2 == 1 {
                values[i - half..=i + half].iter().sum::<f64>() / period as f64
            } else {
                let inner: f64 = values[i - half + 1..i + half].iter().sum();
                (0.5 * values[i - half] + inner + 0.5 * values[i + half]) / period as f64
            }
        })
        .collect();

    (half, trend)
}

/// Split `values` into trend and seasonal index.
pub fn decompose(values: &[f64], season_length: usize) -> Result<Decomposition, ForecastError> {
    if season_length == 0 {
        return Err(ForecastError::InvalidConfig(
            "seasonLength must be positive".to_string(),
        ));
    }
    require_len(values, 2 * season_length)?;

    let (offset, trend) = centered_moving_average(values, season_length);

    let mut sums = vec![0.0; season_length];
    let mut counts = vec![0usize; season_length];
    for (k, t) in trend.iter().enumerate() {
        let i = offset + k;
        let pos = i % season_length;
        sums[pos] += values[i] - t;
        counts[pos] += 1;
    }

    let mut seasonal_index: Vec<f64> = sums
        .iter()
        .zip(counts.iter())
        .map(|(s, c)| if *c > 0 { s / *c as f64 } else { 0.0 })
        .collect();

    let mean = seasonal_index.iter().sum::<f64>() / season_length as f64;
    for s in seasonal_index.iter_mut() {
        *s -= mean;
    }

    Ok(Decomposition {
        trend_offset: offset,
        trend,
        seasonal_index,
    })
}

/// Seasonal decomposition forecast.
///
/// The trend is extrapolated linearly and the seasonal index for
/// `(n + i) mod season_length` is added to step `i` (0-based).
pub fn seasonal_decomposition(
    values: &[f64],
    season_length: usize,
    horizon: usize,
) -> Result<Vec<f64>, ForecastError> {
    check_horizon(horizon)?;
    let decomposition = decompose(values, season_length)?;

    let fit = fit_line(&decomposition.trend).ok_or_else(|| {
        ForecastError::Computation("trend too short to extrapolate".to_string())
    })?;

    let n = values.len();
    let forecast = (0..horizon)
        .map(|i| {
            let t = n + i;
            let trend = fit.value_at((t - decomposition.trend_offset) as f64);
            trend + decomposition.seasonal_index[t % season_length]
        })
        .collect();

    ensure_finite(forecast)
}
