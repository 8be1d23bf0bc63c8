use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cashflow_store::{parse_transactions_csv, CashflowDb};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use forecast_backtest::BacktestEngine;
use forecast_core::{AlgorithmType, CancelToken, ForecastConfig, ForecastResult};
use forecast_orchestrator::{summarize, ForecastOrchestrator, ForecastSettings, ForecastSummary};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "cashflow-forecast", about = "Cash-flow forecasting and backtesting")]
pub struct Cli {
    /// SQLite database URL (defaults to $DATABASE_URL, then sqlite:cashflow.db)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database schema, optionally registering a user
    InitDb {
        #[arg(long)]
        user: Option<String>,
    },
    /// Import transactions from CSV (date,type,amount[,description])
    Import {
        #[arg(long)]
        user_id: i64,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Forecast with a single algorithm
    Forecast {
        #[arg(long)]
        user_id: i64,
        #[command(flatten)]
        algorithm: AlgorithmArgs,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Forecast with several configs against one history fetch
    Batch {
        #[arg(long)]
        user_id: i64,
        /// JSON config, e.g. '{"algorithm":"SMA","windowSize":7}'; repeatable.
        /// Defaults to one preset per algorithm.
        #[arg(long = "config")]
        configs: Vec<String>,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Backtest an algorithm and forecast with the measured confidence
    Backtest {
        #[arg(long)]
        user_id: i64,
        #[command(flatten)]
        algorithm: AlgorithmArgs,
        #[command(flatten)]
        window: WindowArgs,
        /// Periods of history to replay (defaults to FORECAST_DEFAULT_LOOKBACK)
        #[arg(long)]
        lookback: Option<u32>,
    },
}

#[derive(Args, Debug)]
pub struct AlgorithmArgs {
    #[arg(long, default_value = "linear_regression")]
    pub algorithm: AlgorithmType,
    #[arg(long)]
    pub window_size: Option<i32>,
    #[arg(long)]
    pub alpha: Option<f64>,
    #[arg(long)]
    pub season_length: Option<i32>,
}

impl AlgorithmArgs {
    /// Explicit parameters win; anything missing comes from the algorithm's preset.
    pub fn to_config(&self) -> ForecastConfig {
        let preset = ForecastConfig::presets()
            .into_iter()
            .find(|c| c.algorithm == self.algorithm)
            .unwrap_or_else(ForecastConfig::linear_regression);

        ForecastConfig {
            algorithm: self.algorithm,
            window_size: self.window_size.or(preset.window_size),
            alpha: self.alpha.or(preset.alpha),
            season_length: self.season_length.or(preset.season_length),
        }
    }
}

#[derive(Args, Debug)]
pub struct WindowArgs {
    /// First forecast date, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub start: Option<NaiveDate>,
    /// Number of periods to forecast (defaults to FORECAST_DEFAULT_HORIZON)
    #[arg(long)]
    pub horizon: Option<u32>,
}

impl WindowArgs {
    fn resolve(&self, settings: &ForecastSettings) -> (NaiveDate, u32) {
        (
            self.start
                .unwrap_or_else(|| chrono::Local::now().date_naive()),
            self.horizon.unwrap_or(settings.default_horizon),
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ForecastOutput {
    user_id: i64,
    config: ForecastConfig,
    results: Vec<ForecastResult>,
    summary: Option<ForecastSummary>,
}

pub async fn run(cli: Cli, settings: ForecastSettings, cancel: CancelToken) -> Result<()> {
    let database_url = cli
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite:cashflow.db".to_string());
    let db = Arc::new(
        CashflowDb::new(&database_url)
            .await
            .with_context(|| format!("failed to open {}", database_url))?,
    );

    match cli.command {
        Command::InitDb { user } => {
            let user_id = match user {
                Some(name) => Some(match db.find_user(&name).await? {
                    Some(id) => id,
                    None => db.create_user(&name).await?,
                }),
                None => None,
            };
            tracing::info!("Database ready at {}", database_url);
            print_json(&serde_json::json!({ "database": database_url, "userId": user_id }))
        }
        Command::Import { user_id, file } => {
            if !db.user_exists(user_id).await? {
                bail!("user {} does not exist", user_id);
            }
            let reader = std::fs::File::open(&file)
                .with_context(|| format!("failed to open {}", file.display()))?;
            let transactions = parse_transactions_csv(reader)?;
            let imported = db.insert_transactions(user_id, &transactions).await?;
            print_json(&serde_json::json!({ "userId": user_id, "imported": imported }))
        }
        Command::Forecast {
            user_id,
            algorithm,
            window,
        } => {
            let config = algorithm.to_config();
            let (start, horizon) = window.resolve(&settings);
            let orchestrator = ForecastOrchestrator::new(db.clone(), settings)
                .with_result_store(db.clone());

            let results = orchestrator
                .generate_forecast(user_id, &config, start, horizon, &cancel)
                .await?;
            print_json(&ForecastOutput {
                user_id,
                summary: summarize(&results),
                config,
                results,
            })
        }
        Command::Batch {
            user_id,
            configs,
            window,
        } => {
            let configs = if configs.is_empty() {
                ForecastConfig::presets()
            } else {
                configs
                    .iter()
                    .map(|raw| {
                        serde_json::from_str::<ForecastConfig>(raw)
                            .with_context(|| format!("invalid config JSON: {}", raw))
                    })
                    .collect::<Result<Vec<_>>>()?
            };
            let (start, horizon) = window.resolve(&settings);
            let orchestrator = ForecastOrchestrator::new(db.clone(), settings)
                .with_result_store(db.clone());

            let batch = orchestrator
                .batch_generate_forecasts(user_id, &configs, start, horizon, &cancel)
                .await?;
            print_json(&batch)
        }
        Command::Backtest {
            user_id,
            algorithm,
            window,
            lookback,
        } => {
            let config = algorithm.to_config();
            let (start, horizon) = window.resolve(&settings);
            let lookback = lookback.unwrap_or(settings.default_lookback);
            let engine = BacktestEngine::new(db.clone(), settings).with_result_store(db.clone());

            let report = engine
                .run(user_id, &config, start, horizon, lookback, &cancel)
                .await?;
            print_json(&report)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forecast_command() {
        let cli = Cli::try_parse_from([
            "cashflow-forecast",
            "forecast",
            "--user-id",
            "4",
            "--algorithm",
            "sma",
            "--window-size",
            "3",
            "--start",
            "2024-03-01",
        ])
        .unwrap();

        match cli.command {
            Command::Forecast {
                user_id,
                algorithm,
                window,
            } => {
                assert_eq!(user_id, 4);
                assert_eq!(algorithm.to_config(), ForecastConfig::sma(3));
                assert_eq!(window.start, NaiveDate::from_ymd_opt(2024, 3, 1));
                assert_eq!(window.horizon, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_missing_parameters_use_presets() {
        let args = AlgorithmArgs {
            algorithm: AlgorithmType::Ewma,
            window_size: None,
            alpha: None,
            season_length: None,
        };
        assert_eq!(args.to_config(), ForecastConfig::ewma(0.3));
    }

    #[test]
    fn test_batch_accepts_repeated_configs() {
        let cli = Cli::try_parse_from([
            "cashflow-forecast",
            "batch",
            "--user-id",
            "1",
            "--config",
            r#"{"algorithm":"SMA","windowSize":7}"#,
            "--config",
            r#"{"algorithm":"EWMA","alpha":0.5}"#,
        ])
        .unwrap();

        match cli.command {
            Command::Batch { configs, .. } => assert_eq!(configs.len(), 2),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
