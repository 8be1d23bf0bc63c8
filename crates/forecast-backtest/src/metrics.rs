use forecast_core::BacktestAccuracyRecord;
use forecast_orchestrator::clamp_confidence;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Aggregate error statistics over the evaluated anchors of one backtest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyMetrics {
    /// Anchors with a forecast and an observed actual.
    pub evaluated: usize,
    /// Anchors without enough training data or without an actual.
    pub skipped: usize,
    pub mae: Option<f64>,
    pub rmse: Option<f64>,
    /// Mean of the defined percentage errors, as a fraction (0.1 = 10%).
    pub mape: Option<f64>,
    /// Evaluated anchors whose actual was zero and so carry no percentage error.
    pub zero_actuals: usize,
}

impl AccuracyMetrics {
    pub fn from_records(records: &[BacktestAccuracyRecord], skipped: usize) -> Self {
        let errors: Vec<f64> = records
            .iter()
            .map(|r| r.absolute_error.to_f64().unwrap_or(f64::NAN))
            .filter(|e| e.is_finite())
            .collect();
        let percentages: Vec<f64> = records.iter().filter_map(|r| r.percentage_error).collect();

        let (mae, rmse) = if errors.is_empty() {
            (None, None)
        } else {
            (Some(errors.iter().mean()), Some(errors.iter().quadratic_mean()))
        };
        let mape = if percentages.is_empty() {
            None
        } else {
            Some(percentages.iter().mean())
        };

        Self {
            evaluated: records.len(),
            skipped,
            mae,
            rmse,
            mape,
            zero_actuals: records.len() - percentages.len(),
        }
    }

    /// `clamp(1 - MAPE)`, or `None` when no anchor produced a percentage error.
    pub fn confidence(&self) -> Option<f64> {
        self.mape.map(|mape| clamp_confidence(1.0 - mape))
    }
}
