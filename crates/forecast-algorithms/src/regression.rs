use forecast_core::{check_horizon, ForecastError};

use crate::{ensure_finite, require_len};

/// Ordinary least squares line `value = slope * index + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn value_at(&self, index: f64) -> f64 {
        self.slope * index + self.intercept
    }
}

/// Fit a line over indices `0..values.len()`.
///
/// Returns `None` for fewer than two values. A flat series yields slope 0.
pub fn fit_line(values: &[f64]) -> Option<LinearFit> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n_f;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }

    // sxx > 0 whenever n >= 2 since x is the index
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    Some(LinearFit {
        slope,
        intercept: y_mean - slope * x_mean,
    })
}

/// Linear trend forecast: step `h` (1-based) is `slope * (n - 1 + h) + intercept`.
pub fn linear_regression_forecast(
    values: &[f64],
    horizon: usize,
) -> Result<Vec<f64>, ForecastError> {
    check_horizon(horizon)?;
    require_len(values, 2)?;

    let fit = fit_line(values).ok_or(ForecastError::InsufficientData {
        required: 2,
        actual: values.len(),
    })?;
    let last = (values.len() - 1) as f64;

    ensure_finite(
        (1..=horizon)
            .map(|h| fit.value_at(last + h as f64))
            .collect(),
    )
}
