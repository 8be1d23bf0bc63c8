//! Pure forecasting algorithms over a historical value sequence.
//!
//! Every function maps `values` (oldest first) to exactly `horizon` future
//! values, and fails with `InsufficientData` / `InvalidConfig` instead of
//! returning a partial forecast.

pub mod moving_average;
pub mod regression;
pub mod seasonal;

#[cfg(test)]
mod algorithms_tests;

pub use moving_average::*;
pub use regression::*;
pub use seasonal::*;

use forecast_core::{AlgorithmParams, ForecastError};

/// Run the algorithm selected by `params`.
pub fn forecast(
    values: &[f64],
    horizon: usize,
    params: &AlgorithmParams,
) -> Result<Vec<f64>, ForecastError> {
    if let Some(bad) = values.iter().position(|v| !v.is_finite()) {
        return Err(ForecastError::Computation(format!(
            "non-finite input value at index {}",
            bad
        )));
    }

    match *params {
        AlgorithmParams::Sma { window } => simple_moving_average(values, window, horizon),
        AlgorithmParams::Ewma { alpha } => {
            exponential_weighted_moving_average(values, alpha, horizon)
        }
        AlgorithmParams::LinearRegression => linear_regression_forecast(values, horizon),
        AlgorithmParams::Seasonal { season_length } => {
            seasonal_decomposition(values, season_length, horizon)
        }
    }
}

pub(crate) fn require_len(values: &[f64], required: usize) -> Result<(), ForecastError> {
    if values.is_empty() || values.len() < required {
        return Err(ForecastError::InsufficientData {
            required: required.max(1),
            actual: values.len(),
        });
    }
    Ok(())
}

pub(crate) fn ensure_finite(values: Vec<f64>) -> Result<Vec<f64>, ForecastError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(ForecastError::Computation(format!(
            "forecast step {} is not finite",
            i
        ))),
        None => Ok(values),
    }
}
