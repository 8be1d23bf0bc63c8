use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use forecast_core::{
    AlgorithmType, BacktestAccuracyRecord, ForecastError, ForecastResult, ResultStore,
    TimeSeriesPoint, TransactionStore,
};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

/// Process-local store, used by tests and dry runs.
///
/// Series are returned exactly as inserted (filtered by date, never re-sorted).
#[derive(Default)]
pub struct InMemoryStore {
    series: RwLock<HashMap<i64, Vec<TimeSeriesPoint>>>,
    forecasts: RwLock<Vec<(i64, ForecastResult)>>,
    accuracy: RwLock<Vec<(i64, BacktestAccuracyRecord)>>,
    fetch_delay: Option<Duration>,
    history_delay: Option<Duration>,
    fail_writes: AtomicBool,
    fetches: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `user_id` with the given series.
    pub fn with_series(mut self, user_id: i64, points: Vec<TimeSeriesPoint>) -> Self {
        self.series.get_mut().insert(user_id, points);
        self
    }

    /// Register `user_id` with values on consecutive days starting at `first`.
    pub fn with_daily_values(self, user_id: i64, first: NaiveDate, values: &[Decimal]) -> Self {
        let points = first
            .iter_days()
            .zip(values)
            .map(|(date, value)| TimeSeriesPoint::new(date, *value))
            .collect();
        self.with_series(user_id, points)
    }

    /// Sleep before answering each fetch.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Sleep before answering each accuracy-history lookup.
    pub fn with_history_delay(mut self, delay: Duration) -> Self {
        self.history_delay = Some(delay);
        self
    }

    /// Make every subsequent write fail with a storage error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub async fn stored_forecasts(&self, user_id: i64) -> Vec<ForecastResult> {
        self.forecasts
            .read()
            .await
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub async fn stored_accuracy(&self, user_id: i64) -> Vec<BacktestAccuracyRecord> {
        self.accuracy
            .read()
            .await
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .map(|(_, r)| r.clone())
            .collect()
    }

    fn check_writable(&self) -> Result<(), ForecastError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ForecastError::Storage("write rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn fetch_series(
        &self,
        user_id: i64,
        start: Option<NaiveDate>,
        end: NaiveDate,
    ) -> Result<Vec<TimeSeriesPoint>, ForecastError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        let series = self.series.read().await;
        let points = series
            .get(&user_id)
            .ok_or(ForecastError::UserNotFound(user_id))?;

        Ok(points
            .iter()
            .filter(|p| p.date < end && start.map_or(true, |s| p.date >= s))
            .copied()
            .collect())
    }
}

#[async_trait]
impl ResultStore for InMemoryStore {
    async fn store_forecast_results(
        &self,
        user_id: i64,
        results: &[ForecastResult],
    ) -> Result<(), ForecastError> {
        self.check_writable()?;
        self.forecasts
            .write()
            .await
            .extend(results.iter().map(|r| (user_id, r.clone())));
        Ok(())
    }

    async fn store_accuracy_records(
        &self,
        user_id: i64,
        records: &[BacktestAccuracyRecord],
    ) -> Result<(), ForecastError> {
        self.check_writable()?;
        self.accuracy
            .write()
            .await
            .extend(records.iter().map(|r| (user_id, r.clone())));
        Ok(())
    }

    async fn historical_confidence(
        &self,
        user_id: i64,
        algorithm: AlgorithmType,
    ) -> Result<Option<f64>, ForecastError> {
        if let Some(delay) = self.history_delay {
            tokio::time::sleep(delay).await;
        }
        let accuracy = self.accuracy.read().await;
        let scores: Vec<f64> = accuracy
            .iter()
            .filter(|(uid, r)| *uid == user_id && r.algorithm == algorithm)
            .map(|(_, r)| r.confidence_score)
            .collect();

        if scores.is_empty() {
            return Ok(None);
        }
        Ok(Some(scores.iter().sum::<f64>() / scores.len() as f64))
    }
}
