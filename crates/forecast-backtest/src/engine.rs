use std::sync::Arc;

use chrono::NaiveDate;
use forecast_core::{
    check_horizon, series_values, to_amount, AlgorithmParams, BacktestAccuracyRecord, CancelToken,
    ForecastConfig, ForecastError, ForecastResult, PeriodUnit, ResultStore, TimeSeriesPoint,
    TransactionStore,
};
use forecast_orchestrator::{
    clamp_confidence, fetch_checked, run_config, ConfidenceResolver,
    ConstantConfidence, ForecastSettings, ResultAssembler,
};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::metrics::AccuracyMetrics;

/// Everything a backtest produced, in addition to the annotated live forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestReport {
    pub forecast: Vec<ForecastResult>,
    pub records: Vec<BacktestAccuracyRecord>,
    pub metrics: AccuracyMetrics,
    pub confidence: f64,
    /// False when no anchor produced a percentage error and the default was used.
    pub confidence_from_backtest: bool,
}

/// Scores an algorithm by replaying it on truncated history.
pub struct BacktestEngine {
    transactions: Arc<dyn TransactionStore>,
    result_store: Option<Arc<dyn ResultStore>>,
    settings: ForecastSettings,
}

impl BacktestEngine {
    pub fn new(transactions: Arc<dyn TransactionStore>, settings: ForecastSettings) -> Self {
        Self {
            transactions,
            result_store: None,
            settings,
        }
    }

    pub fn with_result_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.result_store = Some(store);
        self
    }

    /// Backtest `config`, persist the accuracy records, and return the live
    /// forecast from `start_date` annotated with the backtest confidence.
    pub async fn backtest_and_store_accuracy(
        &self,
        user_id: i64,
        config: &ForecastConfig,
        start_date: NaiveDate,
        horizon_days: u32,
        lookback_days: u32,
        cancel: &CancelToken,
    ) -> Result<Vec<ForecastResult>, ForecastError> {
        let report = self
            .run(user_id, config, start_date, horizon_days, lookback_days, cancel)
            .await?;
        Ok(report.forecast)
    }

    /// Same as [`backtest_and_store_accuracy`](Self::backtest_and_store_accuracy),
    /// returning the full report.
    pub async fn run(
        &self,
        user_id: i64,
        config: &ForecastConfig,
        start_date: NaiveDate,
        horizon_days: u32,
        lookback_days: u32,
        cancel: &CancelToken,
    ) -> Result<BacktestReport, ForecastError> {
        tracing::info!(
            user_id,
            %config,
            horizon_days,
            lookback_days,
            "Starting backtest ending {}",
            start_date
        );

        check_horizon(horizon_days as usize)?;
        if lookback_days == 0 {
            return Err(ForecastError::InvalidConfig(
                "lookback must be positive".to_string(),
            ));
        }
        let params = config.validate()?;
        let period = self.settings.period;

        let window_start = period
            .retreat(start_date, lookback_days.saturating_add(horizon_days))
            .ok_or_else(|| {
                ForecastError::InvalidConfig(format!(
                    "lookback window before {} is out of calendar range",
                    start_date
                ))
            })?;

        // Anchors are confined to the lookback window but train on all prior history.
        let series: Arc<[TimeSeriesPoint]> =
            fetch_checked(self.transactions.as_ref(), user_id, None, start_date, cancel)
                .await?
                .into();

        let token = cancel.clone();
        let anchors_series = Arc::clone(&series);
        let (mut records, skipped) = tokio::task::spawn_blocking(move || {
            simulate_anchors(
                &anchors_series,
                params,
                period,
                window_start,
                start_date,
                horizon_days,
                &token,
            )
        })
        .await
        .map_err(|e| ForecastError::Computation(format!("backtest task failed: {}", e)))??;

        let metrics = AccuracyMetrics::from_records(&records, skipped);
        let (confidence, confidence_from_backtest) = match metrics.confidence() {
            Some(score) => (score, true),
            None => {
                tracing::warn!(
                    user_id,
                    %config,
                    evaluated = metrics.evaluated,
                    skipped = metrics.skipped,
                    "No usable backtest anchors, falling back to default confidence"
                );
                (clamp_confidence(self.settings.default_confidence), false)
            }
        };

        for record in records.iter_mut() {
            record.confidence_score = confidence;
        }

        cancel.check()?;
        self.persist_records(user_id, &records).await;

        let values: Arc<[f64]> = series_values(&series)?.into();
        let resolver = ConfidenceResolver::new(
            self.settings.clone(),
            None,
            Some(Arc::new(ConstantConfidence(confidence))),
        );
        let forecast = run_config(
            user_id,
            params,
            values,
            start_date,
            horizon_days,
            ResultAssembler::new(period),
            resolver,
            cancel.clone(),
        )
        .await?;

        self.persist_forecast(user_id, &forecast).await;

        tracing::info!(
            user_id,
            %config,
            evaluated = metrics.evaluated,
            skipped = metrics.skipped,
            confidence,
            "Backtest complete"
        );

        Ok(BacktestReport {
            forecast,
            records,
            metrics,
            confidence,
            confidence_from_backtest,
        })
    }

    async fn persist_records(&self, user_id: i64, records: &[BacktestAccuracyRecord]) {
        if records.is_empty() {
            return;
        }
        if let Some(store) = &self.result_store {
            if let Err(e) = store.store_accuracy_records(user_id, records).await {
                tracing::warn!(user_id, stage = "persist", "Failed to store accuracy records: {}", e);
            }
        }
    }

    async fn persist_forecast(&self, user_id: i64, results: &[ForecastResult]) {
        if !self.settings.persist_results || results.is_empty() {
            return;
        }
        if let Some(store) = &self.result_store {
            if let Err(e) = store.store_forecast_results(user_id, results).await {
                tracing::warn!(user_id, stage = "persist", "Failed to store forecast results: {}", e);
            }
        }
    }
}

/// Replay the algorithm at every anchor from `window_start` whose target
/// falls before `start_date`.
///
/// Anchor `a` trains on every point in `series` dated before `a`. The last
/// forecast step (offset `horizon_days - 1`, which the assembler would date
/// `a + horizon_days - 1`) is scored against the observation dated
/// `a + horizon_days` periods, so a prediction made at `a` is judged a full
/// horizon after it. Returns the records (with a zero confidence
/// placeholder) and the number of skipped anchors.
pub fn simulate_anchors(
    series: &[TimeSeriesPoint],
    params: AlgorithmParams,
    period: PeriodUnit,
    window_start: NaiveDate,
    start_date: NaiveDate,
    horizon_days: u32,
    cancel: &CancelToken,
) -> Result<(Vec<BacktestAccuracyRecord>, usize), ForecastError> {
    let values = series_values(series)?;
    let horizon = horizon_days as usize;
    let mut records = Vec::new();
    let mut skipped = 0usize;

    let mut step = 0u32;
    loop {
        cancel.check()?;

        let Some(anchor) = period.advance(window_start, step) else {
            break;
        };
        let Some(target) = period.advance(anchor, horizon_days) else {
            break;
        };
        if target >= start_date {
            break;
        }
        step += 1;

        let train_len = series.partition_point(|p| p.date < anchor);
        if train_len < params.min_length().max(1) {
            tracing::debug!(%anchor, train_len, "Skipping anchor: not enough history");
            skipped += 1;
            continue;
        }

        let Ok(actual_idx) = series.binary_search_by_key(&target, |p| p.date) else {
            tracing::debug!(%anchor, %target, "Skipping anchor: no actual observed");
            skipped += 1;
            continue;
        };

        let forecast = forecast_algorithms::forecast(&values[..train_len], horizon, &params)?;
        let predicted_value = forecast.last().copied().ok_or_else(|| {
            ForecastError::Computation("algorithm returned an empty forecast".to_string())
        })?;

        let predicted = to_amount(predicted_value)?;
        let actual = series[actual_idx].value;
        let absolute_error = predicted
            .checked_sub(actual)
            .map(|d| d.abs())
            .ok_or_else(|| {
                ForecastError::Computation(format!("error overflow at anchor {}", anchor))
            })?;
        let percentage_error = if actual.is_zero() {
            None
        } else {
            absolute_error
                .checked_div(actual.abs())
                .and_then(|ratio| ratio.to_f64())
        };

        records.push(BacktestAccuracyRecord {
            anchor_date: anchor,
            horizon_days,
            algorithm: params.algorithm(),
            predicted_amount: predicted,
            actual_amount: actual,
            absolute_error,
            percentage_error,
            confidence_score: 0.0,
        });
    }

    Ok((records, skipped))
}
