use std::env;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use forecast_core::PeriodUnit;
use serde::{Deserialize, Serialize};

use crate::confidence::{ConfidenceModel, ConstantConfidence, HorizonDecay};

/// Caller-level defaults for forecast and backtest requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastSettings {
    pub period: PeriodUnit,
    pub default_horizon: u32,       // 7
    pub default_lookback: u32,      // 60
    pub default_confidence: f64,    // 0.75
    pub confidence_decay: f64,      // per horizon step, 0 = flat
    pub confidence_floor: f64,
    pub use_accuracy_history: bool, // derive confidence from stored backtests
    pub persist_results: bool,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            period: PeriodUnit::Daily,
            default_horizon: 7,
            default_lookback: 60,
            default_confidence: 0.75,
            confidence_decay: 0.0,
            confidence_floor: 0.0,
            use_accuracy_history: true,
            persist_results: true,
        }
    }
}

impl ForecastSettings {
    /// Read `FORECAST_*` variables, falling back to the defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let settings = Self {
            period: match env::var("FORECAST_PERIOD") {
                Ok(v) => v.parse().map_err(|e| anyhow::anyhow!("FORECAST_PERIOD: {}", e))?,
                Err(_) => defaults.period,
            },
            default_horizon: parse_var("FORECAST_DEFAULT_HORIZON", defaults.default_horizon)?,
            default_lookback: parse_var("FORECAST_DEFAULT_LOOKBACK", defaults.default_lookback)?,
            default_confidence: parse_var(
                "FORECAST_DEFAULT_CONFIDENCE",
                defaults.default_confidence,
            )?,
            confidence_decay: parse_var("FORECAST_CONFIDENCE_DECAY", defaults.confidence_decay)?,
            confidence_floor: parse_var("FORECAST_CONFIDENCE_FLOOR", defaults.confidence_floor)?,
            use_accuracy_history: parse_var(
                "FORECAST_USE_ACCURACY_HISTORY",
                defaults.use_accuracy_history,
            )?,
            persist_results: parse_var("FORECAST_PERSIST_RESULTS", defaults.persist_results)?,
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_horizon == 0 {
            bail!("default_horizon must be positive");
        }
        if self.default_lookback == 0 {
            bail!("default_lookback must be positive");
        }
        for (name, value) in [
            ("default_confidence", self.default_confidence),
            ("confidence_floor", self.confidence_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{} must be within [0, 1], got {}", name, value);
            }
        }
        if !(self.confidence_decay >= 0.0) {
            bail!("confidence_decay must be non-negative, got {}", self.confidence_decay);
        }
        Ok(())
    }

    /// Confidence model used when no override or backtest history applies.
    pub fn default_confidence_model(&self) -> Arc<dyn ConfidenceModel> {
        if self.confidence_decay > 0.0 {
            Arc::new(HorizonDecay {
                base: self.default_confidence,
                decay_per_step: self.confidence_decay,
                floor: self.confidence_floor,
            })
        } else {
            Arc::new(ConstantConfidence(self.default_confidence))
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}
