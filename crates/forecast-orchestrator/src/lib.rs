use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use forecast_core::{
    check_horizon, series_values, validate_series, AlgorithmParams, BatchEntry, CancelToken, ErrorDescriptor,
    ForecastConfig, ForecastError, ForecastResult, ResultStore, TimeSeriesPoint,
    TransactionStore,
};
use tokio::task::{JoinHandle, JoinSet};

pub mod assembler;
pub mod confidence;
pub mod settings;
pub mod summary;


pub use assembler::ResultAssembler;
pub use confidence::{
    clamp_confidence, ConfidenceModel, ConfidenceResolver, ConstantConfidence, HorizonDecay,
};
pub use settings::ForecastSettings;
pub use summary::{summarize, ForecastSummary, RiskLevel, TrendDirection};

/// Runs forecasting algorithms over a user's history and assembles dated results.
pub struct ForecastOrchestrator {
    transactions: Arc<dyn TransactionStore>,
    result_store: Option<Arc<dyn ResultStore>>,
    settings: ForecastSettings,
    confidence_override: Option<Arc<dyn ConfidenceModel>>,
}

impl ForecastOrchestrator {
    pub fn new(transactions: Arc<dyn TransactionStore>, settings: ForecastSettings) -> Self {
        Self {
            transactions,
            result_store: None,
            settings,
            confidence_override: None,
        }
    }

    /// Persist results and read backtest history through this store.
    pub fn with_result_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.result_store = Some(store);
        self
    }

    /// Use a fixed confidence model instead of defaults / backtest history.
    pub fn with_confidence_model(mut self, model: Arc<dyn ConfidenceModel>) -> Self {
        self.confidence_override = Some(model);
        self
    }

    pub fn settings(&self) -> &ForecastSettings {
        &self.settings
    }

    fn assembler(&self) -> ResultAssembler {
        ResultAssembler::new(self.settings.period)
    }

    fn resolver(&self) -> ConfidenceResolver {
        ConfidenceResolver::new(
            self.settings.clone(),
            self.result_store.clone(),
            self.confidence_override.clone(),
        )
    }

    /// Fetch the user's series for `[start, end)` and check it is strictly ascending.
    pub async fn fetch_history(
        &self,
        user_id: i64,
        start: Option<NaiveDate>,
        end: NaiveDate,
        cancel: &CancelToken,
    ) -> Result<Vec<TimeSeriesPoint>, ForecastError> {
        fetch_checked(self.transactions.as_ref(), user_id, start, end, cancel).await
    }

    /// Forecast `horizon_days` periods from `start_date` using history strictly before it.
    pub async fn generate_forecast(
        &self,
        user_id: i64,
        config: &ForecastConfig,
        start_date: NaiveDate,
        horizon_days: u32,
        cancel: &CancelToken,
    ) -> Result<Vec<ForecastResult>, ForecastError> {
        tracing::info!(
            user_id,
            %config,
            horizon_days,
            "Generating forecast starting {}",
            start_date
        );

        check_horizon(horizon_days as usize)?;
        let params = config.validate()?;

        let history = self.fetch_history(user_id, None, start_date, cancel).await?;
        let values: Arc<[f64]> = series_values(&history)?.into();

        let results = run_config(
            user_id,
            params,
            values,
            start_date,
            horizon_days,
            self.assembler(),
            self.resolver(),
            cancel.clone(),
        )
        .await
        .inspect_err(|e| {
            tracing::warn!(user_id, %config, stage = "compute", "Forecast failed: {}", e)
        })?;

        self.persist(user_id, &results).await;

        tracing::info!(user_id, %config, steps = results.len(), "Forecast complete");
        Ok(results)
    }

    /// Run several configs against one fetch of the user's history.
    ///
    /// Each config is computed in its own task; a failing config yields a
    /// [`BatchEntry::Failure`] instead of failing the batch. Entries keep the
    /// order of `configs`. Fetch errors and cancellation fail the whole call.
    pub async fn batch_generate_forecasts(
        &self,
        user_id: i64,
        configs: &[ForecastConfig],
        start_date: NaiveDate,
        horizon_days: u32,
        cancel: &CancelToken,
    ) -> Result<HashMap<i64, Vec<BatchEntry>>, ForecastError> {
        tracing::info!(
            user_id,
            configs = configs.len(),
            horizon_days,
            "Generating batch forecast starting {}",
            start_date
        );

        let history = self.fetch_history(user_id, None, start_date, cancel).await?;
        let values: Arc<[f64]> = series_values(&history)?.into();

        let mut tasks = JoinSet::new();
        for (idx, config) in configs.iter().enumerate() {
            cancel.check()?;
            let config = config.clone();
            let values = Arc::clone(&values);
            let assembler = self.assembler();
            let resolver = self.resolver();
            let token = cancel.clone();

            tasks.spawn(async move {
                let outcome = match check_horizon(horizon_days as usize).and_then(|_| config.validate()) {
                    Ok(params) => {
                        run_config(
                            user_id,
                            params,
                            values,
                            start_date,
                            horizon_days,
                            assembler,
                            resolver,
                            token,
                        )
                        .await
                    }
                    Err(e) => Err(e),
                };
                (idx, outcome)
            });
        }

        let mut slots: Vec<Option<Result<Vec<ForecastResult>, ForecastError>>> =
            (0..configs.len()).map(|_| None).collect();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    tracing::warn!(user_id, "Batch forecast cancelled, discarding partial results");
                    return Err(ForecastError::Cancelled);
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((idx, outcome))) => slots[idx] = Some(outcome),
                    Some(Err(e)) => tracing::error!(user_id, "Batch forecast task error: {}", e),
                },
            }
        }

        let mut entries = Vec::with_capacity(configs.len());
        for (config, slot) in configs.iter().zip(slots) {
            let outcome = slot.unwrap_or_else(|| {
                Err(ForecastError::Computation(
                    "forecast task ended without a result".to_string(),
                ))
            });

            match outcome {
                Ok(results) => {
                    self.persist(user_id, &results).await;
                    entries.push(BatchEntry::Success {
                        config: config.clone(),
                        results,
                    });
                }
                Err(e) => {
                    tracing::warn!(user_id, %config, stage = "compute", "Batch entry failed: {}", e);
                    entries.push(BatchEntry::Failure {
                        config: config.clone(),
                        error: ErrorDescriptor::from(&e),
                    });
                }
            }
        }

        let succeeded = entries.iter().filter(|e| e.is_success()).count();
        tracing::info!(
            user_id,
            succeeded,
            failed = entries.len() - succeeded,
            "Batch forecast complete"
        );

        Ok(HashMap::from([(user_id, entries)]))
    }

    /// Detached variant of [`generate_forecast`](Self::generate_forecast) for callers
    /// that want a task handle instead of awaiting inline.
    pub fn spawn_forecast(
        self: &Arc<Self>,
        user_id: i64,
        config: ForecastConfig,
        start_date: NaiveDate,
        horizon_days: u32,
        cancel: CancelToken,
    ) -> JoinHandle<Result<Vec<ForecastResult>, ForecastError>> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator
                .generate_forecast(user_id, &config, start_date, horizon_days, &cancel)
                .await
        })
    }

    /// Hand results to the result store; failures are logged, never propagated.
    async fn persist(&self, user_id: i64, results: &[ForecastResult]) {
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

/// Fetch `[start, end)` from `store`, racing the call against cancellation,
/// and reject series that are not strictly ascending by date.
pub async fn fetch_checked(
    store: &dyn TransactionStore,
    user_id: i64,
    start: Option<NaiveDate>,
    end: NaiveDate,
    cancel: &CancelToken,
) -> Result<Vec<TimeSeriesPoint>, ForecastError> {
    cancel.check()?;
    let points = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ForecastError::Cancelled),
        fetched = store.fetch_series(user_id, start, end) => fetched?,
    };
    validate_series(&points)?;
    tracing::debug!(user_id, points = points.len(), "Fetched history ending {}", end);
    Ok(points)
}

/// Compute one config on the blocking pool and assemble its results.
#[allow(clippy::too_many_arguments)]
pub async fn run_config(
    user_id: i64,
    params: AlgorithmParams,
    values: Arc<[f64]>,
    start_date: NaiveDate,
    horizon_days: u32,
    assembler: ResultAssembler,
    resolver: ConfidenceResolver,
    cancel: CancelToken,
) -> Result<Vec<ForecastResult>, ForecastError> {
    cancel.check()?;
    let algorithm = params.algorithm();
    let confidence = resolver.resolve(user_id, algorithm).await;

    let token = cancel.clone();
    let results = tokio::task::spawn_blocking(move || {
        token.check()?;
        let raw = forecast_algorithms::forecast(&values, horizon_days as usize, &params)?;
        assembler.assemble(&raw, start_date, algorithm, confidence.as_ref())
    })
    .await
    .map_err(|e| ForecastError::Computation(format!("forecast task failed: {}", e)))??;

    // Work finished after cancellation is discarded.
    cancel.check()?;
    Ok(results)
}
