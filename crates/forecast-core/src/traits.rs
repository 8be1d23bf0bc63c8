use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{AlgorithmType, BacktestAccuracyRecord, ForecastError, ForecastResult, TimeSeriesPoint};

/// Source of historical cash-flow series.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Points for `user_id` with `start <= date < end`, ascending by date.
    /// `start = None` means from the beginning of the user's history.
    ///
    /// Fails with [`ForecastError::UserNotFound`] for unknown users.
    async fn fetch_series(
        &self,
        user_id: i64,
        start: Option<NaiveDate>,
        end: NaiveDate,
    ) -> Result<Vec<TimeSeriesPoint>, ForecastError>;
}

/// Sink for computed forecasts and backtest accuracy.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn store_forecast_results(
        &self,
        user_id: i64,
        results: &[ForecastResult],
    ) -> Result<(), ForecastError>;

    async fn store_accuracy_records(
        &self,
        user_id: i64,
        records: &[BacktestAccuracyRecord],
    ) -> Result<(), ForecastError>;

    /// Backtest-derived confidence for this user and algorithm, if any history exists.
    async fn historical_confidence(
        &self,
        _user_id: i64,
        _algorithm: AlgorithmType,
    ) -> Result<Option<f64>, ForecastError> {
        Ok(None)
    }
}
