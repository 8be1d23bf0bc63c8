use std::fmt;
use std::str::FromStr;

use chrono::{Duration, Months, NaiveDate};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ForecastError};

/// One observation of a user's cash-flow series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub value: Decimal,
}

impl TimeSeriesPoint {
    pub fn new(date: NaiveDate, value: Decimal) -> Self {
        Self { date, value }
    }
}

/// Forecasting algorithm selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlgorithmType {
    Sma,
    Ewma,
    LinearRegression,
    SeasonalDecomposition,
}

impl AlgorithmType {
    pub const ALL: [AlgorithmType; 4] = [
        AlgorithmType::Sma,
        AlgorithmType::Ewma,
        AlgorithmType::LinearRegression,
        AlgorithmType::SeasonalDecomposition,
    ];

    /// Storage / wire label
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmType::Sma => "SMA",
            AlgorithmType::Ewma => "EWMA",
            AlgorithmType::LinearRegression => "LINEAR_REGRESSION",
            AlgorithmType::SeasonalDecomposition => "SEASONAL_DECOMPOSITION",
        }
    }
}

impl fmt::Display for AlgorithmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlgorithmType {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "SMA" => Ok(AlgorithmType::Sma),
            "EWMA" => Ok(AlgorithmType::Ewma),
            "LINEAR_REGRESSION" | "LR" => Ok(AlgorithmType::LinearRegression),
            "SEASONAL_DECOMPOSITION" | "SEASONAL" => Ok(AlgorithmType::SeasonalDecomposition),
            other => Err(ForecastError::InvalidConfig(format!("unknown algorithm '{}'", other))),
        }
    }
}

/// Caller-supplied algorithm selection and parameters.
///
/// Only the fields required by `algorithm` are inspected; the rest are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastConfig {
    pub algorithm: AlgorithmType,
    #[serde(default)]
    pub window_size: Option<i32>,
    #[serde(default)]
    pub alpha: Option<f64>,
    #[serde(default)]
    pub season_length: Option<i32>,
}

impl ForecastConfig {
    pub fn sma(window_size: i32) -> Self {
        Self {
            algorithm: AlgorithmType::Sma,
            window_size: Some(window_size),
            alpha: None,
            season_length: None,
        }
    }

    pub fn ewma(alpha: f64) -> Self {
        Self {
            algorithm: AlgorithmType::Ewma,
            window_size: None,
            alpha: Some(alpha),
            season_length: None,
        }
    }

    pub fn linear_regression() -> Self {
        Self {
            algorithm: AlgorithmType::LinearRegression,
            window_size: None,
            alpha: None,
            season_length: None,
        }
    }

    pub fn seasonal(season_length: i32) -> Self {
        Self {
            algorithm: AlgorithmType::SeasonalDecomposition,
            window_size: None,
            alpha: None,
            season_length: Some(season_length),
        }
    }

    /// One config per algorithm with the usual daily-data parameters.
    pub fn presets() -> Vec<ForecastConfig> {
        vec![
            ForecastConfig::sma(7),
            ForecastConfig::ewma(0.3),
            ForecastConfig::linear_regression(),
            ForecastConfig::seasonal(7),
        ]
    }

    /// Check the fields the selected algorithm needs and lift them into [`AlgorithmParams`].
    pub fn validate(&self) -> Result<AlgorithmParams, ForecastError> {
        match self.algorithm {
            AlgorithmType::Sma => {
                let window = self.window_size.ok_or_else(|| {
                    ForecastError::InvalidConfig("SMA requires windowSize".to_string())
                })?;
                if window <= 0 {
                    return Err(ForecastError::InvalidConfig(format!(
                        "windowSize must be positive, got {}",
                        window
                    )));
                }
                Ok(AlgorithmParams::Sma { window: window as usize })
            }
            AlgorithmType::Ewma => {
                let alpha = self.alpha.ok_or_else(|| {
                    ForecastError::InvalidConfig("EWMA requires alpha".to_string())
                })?;
                if !(alpha > 0.0 && alpha < 1.0) {
                    return Err(ForecastError::InvalidConfig(format!(
                        "alpha must be in (0, 1), got {}",
                        alpha
                    )));
                }
                Ok(AlgorithmParams::Ewma { alpha })
            }
            AlgorithmType::LinearRegression => Ok(AlgorithmParams::LinearRegression),
            AlgorithmType::SeasonalDecomposition => {
                let season = self.season_length.ok_or_else(|| {
                    ForecastError::InvalidConfig(
                        "SEASONAL_DECOMPOSITION requires seasonLength".to_string(),
                    )
                })?;
                if season <= 0 {
                    return Err(ForecastError::InvalidConfig(format!(
                        "seasonLength must be positive, got {}",
                        season
                    )));
                }
                Ok(AlgorithmParams::Seasonal {
                    season_length: season as usize,
                })
            }
        }
    }
}

impl fmt::Display for ForecastConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.algorithm {
            AlgorithmType::Sma => write!(f, "SMA(window={:?})", self.window_size),
            AlgorithmType::Ewma => write!(f, "EWMA(alpha={:?})", self.alpha),
            AlgorithmType::LinearRegression => write!(f, "LINEAR_REGRESSION"),
            AlgorithmType::SeasonalDecomposition => {
                write!(f, "SEASONAL_DECOMPOSITION(season={:?})", self.season_length)
            }
        }
    }
}

/// Validated parameters, one variant per algorithm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlgorithmParams {
    Sma { window: usize },
    Ewma { alpha: f64 },
    LinearRegression,
    Seasonal { season_length: usize },
}

impl AlgorithmParams {
    pub fn algorithm(&self) -> AlgorithmType {
        match self {
            AlgorithmParams::Sma { .. } => AlgorithmType::Sma,
            AlgorithmParams::Ewma { .. } => AlgorithmType::Ewma,
            AlgorithmParams::LinearRegression => AlgorithmType::LinearRegression,
            AlgorithmParams::Seasonal { .. } => AlgorithmType::SeasonalDecomposition,
        }
    }

    /// Minimum number of historical values the algorithm accepts.
    pub fn min_length(&self) -> usize {
        match self {
            AlgorithmParams::Sma { window } => *window,
            AlgorithmParams::Ewma { .. } => 1,
            AlgorithmParams::LinearRegression => 2,
            AlgorithmParams::Seasonal { season_length } => season_length * 2,
        }
    }
}

/// Spacing between consecutive forecast dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl PeriodUnit {
    /// `date` moved forward by `steps` periods, `None` on calendar overflow.
    pub fn advance(&self, date: NaiveDate, steps: u32) -> Option<NaiveDate> {
        match self {
            PeriodUnit::Daily => date.checked_add_signed(Duration::days(steps as i64)),
            PeriodUnit::Weekly => date.checked_add_signed(Duration::weeks(steps as i64)),
            PeriodUnit::Monthly => date.checked_add_months(Months::new(steps)),
        }
    }

    /// `date` moved back by `steps` periods, `None` on calendar overflow.
    pub fn retreat(&self, date: NaiveDate, steps: u32) -> Option<NaiveDate> {
        match self {
            PeriodUnit::Daily => date.checked_sub_signed(Duration::days(steps as i64)),
            PeriodUnit::Weekly => date.checked_sub_signed(Duration::weeks(steps as i64)),
            PeriodUnit::Monthly => date.checked_sub_months(Months::new(steps)),
        }
    }
}

impl FromStr for PeriodUnit {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(PeriodUnit::Daily),
            "weekly" | "week" => Ok(PeriodUnit::Weekly),
            "monthly" | "month" => Ok(PeriodUnit::Monthly),
            other => Err(ForecastError::InvalidConfig(format!("unknown period '{}'", other))),
        }
    }
}

/// One forecast step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastResult {
    pub date: NaiveDate,
    pub predicted_amount: Decimal,
    pub confidence_score: f64, // 0.0 to 1.0
    pub algorithm: AlgorithmType,
    pub horizon_index: usize,
}

/// Outcome of one simulated forecast in a backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestAccuracyRecord {
    pub anchor_date: NaiveDate,
    pub horizon_days: u32,
    pub algorithm: AlgorithmType,
    pub predicted_amount: Decimal,
    pub actual_amount: Decimal,
    pub absolute_error: Decimal,
    /// `None` when the actual value is zero.
    pub percentage_error: Option<f64>,
    pub confidence_score: f64,
}

/// Serializable description of a failed batch entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ForecastError> for ErrorDescriptor {
    fn from(err: &ForecastError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Per-config outcome of a batch request, in caller order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchEntry {
    Success {
        config: ForecastConfig,
        results: Vec<ForecastResult>,
    },
    Failure {
        config: ForecastConfig,
        error: ErrorDescriptor,
    },
}

impl BatchEntry {
    pub fn config(&self) -> &ForecastConfig {
        match self {
            BatchEntry::Success { config, .. } | BatchEntry::Failure { config, .. } => config,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BatchEntry::Success { .. })
    }

    pub fn results(&self) -> Option<&[ForecastResult]> {
        match self {
            BatchEntry::Success { results, .. } => Some(results),
            BatchEntry::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorDescriptor> {
        match self {
            BatchEntry::Success { .. } => None,
            BatchEntry::Failure { error, .. } => Some(error),
        }
    }
}

/// Reject series with duplicate or descending dates.
pub fn validate_series(points: &[TimeSeriesPoint]) -> Result<(), ForecastError> {
    for pair in points.windows(2) {
        if pair[1].date == pair[0].date {
            return Err(ForecastError::InvalidSeries(format!(
                "duplicate date {}",
                pair[1].date
            )));
        }
        if pair[1].date < pair[0].date {
            return Err(ForecastError::InvalidSeries(format!(
                "{} follows {} (series must be ascending)",
                pair[1].date, pair[0].date
            )));
        }
    }
    Ok(())
}

/// A forecast must cover at least one period.
pub fn check_horizon(horizon: usize) -> Result<(), ForecastError> {
    if horizon == 0 {
        return Err(ForecastError::InvalidConfig(
            "horizon must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Numeric view of a series for the algorithm layer.
pub fn series_values(points: &[TimeSeriesPoint]) -> Result<Vec<f64>, ForecastError> {
    points
        .iter()
        .map(|p| {
            p.value.to_f64().ok_or_else(|| {
                ForecastError::Computation(format!("value on {} is not representable", p.date))
            })
        })
        .collect()
}

/// Convert an algorithm output back to a decimal amount, rejecting NaN and infinities.
pub fn to_amount(value: f64) -> Result<Decimal, ForecastError> {
    if !value.is_finite() {
        return Err(ForecastError::Computation(format!(
            "non-finite forecast value {}",
            value
        )));
    }
    Decimal::from_f64(value)
        .map(|d| d.round_dp(6))
        .ok_or_else(|| ForecastError::Computation(format!("value {} out of decimal range", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_validate_sma_config() {
        assert_eq!(
            ForecastConfig::sma(3).validate().unwrap(),
            AlgorithmParams::Sma { window: 3 }
        );
        assert!(matches!(
            ForecastConfig::sma(0).validate(),
            Err(ForecastError::InvalidConfig(_))
        ));

        let mut missing = ForecastConfig::sma(3);
        missing.window_size = None;
        assert!(missing.validate().is_err());
    }

    #[test]
    fn test_validate_alpha_bounds() {
        assert!(ForecastConfig::ewma(0.3).validate().is_ok());
        assert!(ForecastConfig::ewma(0.0).validate().is_err());
        assert!(ForecastConfig::ewma(1.0).validate().is_err());
        assert!(ForecastConfig::ewma(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_irrelevant_fields_ignored() {
        let mut cfg = ForecastConfig::linear_regression();
        cfg.window_size = Some(-5);
        cfg.alpha = Some(7.0);
        assert_eq!(cfg.validate().unwrap(), AlgorithmParams::LinearRegression);
    }

    #[test]
    fn test_min_lengths() {
        assert_eq!(AlgorithmParams::Sma { window: 7 }.min_length(), 7);
        assert_eq!(AlgorithmParams::Ewma { alpha: 0.5 }.min_length(), 1);
        assert_eq!(AlgorithmParams::LinearRegression.min_length(), 2);
        assert_eq!(AlgorithmParams::Seasonal { season_length: 4 }.min_length(), 8);
    }

    #[test]
    fn test_zero_horizon_rejected() {
        assert!(check_horizon(1).is_ok());
        assert!(matches!(check_horizon(0), Err(ForecastError::InvalidConfig(_))));
    }

    #[test]
    fn test_presets_are_valid() {
        let presets = ForecastConfig::presets();
        assert_eq!(presets.len(), AlgorithmType::ALL.len());
        for (preset, algorithm) in presets.iter().zip(AlgorithmType::ALL) {
            assert_eq!(preset.algorithm, algorithm);
            assert!(preset.validate().is_ok());
        }
    }

    #[test]
    fn test_config_json_shape() {
        let cfg: ForecastConfig =
            serde_json::from_str(r#"{"algorithm":"SMA","windowSize":7}"#).unwrap();
        assert_eq!(cfg, ForecastConfig::sma(7));

        let cfg: ForecastConfig =
            serde_json::from_str(r#"{"algorithm":"SEASONAL_DECOMPOSITION","seasonLength":12}"#)
                .unwrap();
        assert_eq!(cfg.season_length, Some(12));
    }

    #[test]
    fn test_period_advance() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(PeriodUnit::Daily.advance(start, 1), Some(day(31).succ_opt().unwrap()));
        assert_eq!(
            PeriodUnit::Weekly.advance(day(1), 2),
            Some(day(15))
        );
        assert_eq!(
            PeriodUnit::Monthly.advance(start, 1),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(PeriodUnit::Daily.retreat(day(10), 9), Some(day(1)));
    }

    #[test]
    fn test_validate_series_rejects_duplicates_and_disorder() {
        let ok = vec![
            TimeSeriesPoint::new(day(1), dec!(1)),
            TimeSeriesPoint::new(day(2), dec!(2)),
        ];
        assert!(validate_series(&ok).is_ok());

        let dup = vec![
            TimeSeriesPoint::new(day(1), dec!(1)),
            TimeSeriesPoint::new(day(1), dec!(2)),
        ];
        assert!(matches!(validate_series(&dup), Err(ForecastError::InvalidSeries(_))));

        let unordered = vec![
            TimeSeriesPoint::new(day(3), dec!(1)),
            TimeSeriesPoint::new(day(2), dec!(2)),
        ];
        assert!(validate_series(&unordered).is_err());
    }

    #[test]
    fn test_to_amount_rejects_non_finite() {
        assert_eq!(to_amount(130.0).unwrap(), dec!(130));
        assert!(matches!(to_amount(f64::NAN), Err(ForecastError::Computation(_))));
        assert!(to_amount(f64::INFINITY).is_err());
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!("sma".parse::<AlgorithmType>().unwrap(), AlgorithmType::Sma);
        assert_eq!(
            "linear-regression".parse::<AlgorithmType>().unwrap(),
            AlgorithmType::LinearRegression
        );
        assert!("arima".parse::<AlgorithmType>().is_err());
    }
}
