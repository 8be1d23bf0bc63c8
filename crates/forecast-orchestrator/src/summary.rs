use forecast_core::ForecastResult;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Rising,
    Falling,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Headline figures for one forecast sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastSummary {
    pub steps: usize,
    pub total_predicted: Decimal,
    pub average_predicted: Decimal,
    pub mean_confidence: f64,
    pub trend: TrendDirection,
    pub risk_level: RiskLevel,
}

/// Relative change between first and last step below which the trend is flat.
const FLAT_THRESHOLD: f64 = 0.01;

/// Summarize a forecast; `None` for an empty sequence or a total that overflows.
pub fn summarize(results: &[ForecastResult]) -> Option<ForecastSummary> {
    let first = results.first()?;
    let last = results.last()?;

    let total_predicted = results
        .iter()
        .try_fold(Decimal::ZERO, |acc, r| acc.checked_add(r.predicted_amount))?;
    let average_predicted = total_predicted / Decimal::from(results.len() as u64);
    let mean_confidence =
        results.iter().map(|r| r.confidence_score).sum::<f64>() / results.len() as f64;

    let start = first.predicted_amount.to_f64().unwrap_or(0.0);
    let end = last.predicted_amount.to_f64().unwrap_or(0.0);
    let change = if start.abs() > f64::EPSILON {
        (end - start) / start.abs()
    } else {
        end - start
    };
    let trend = if change > FLAT_THRESHOLD {
        TrendDirection::Rising
    } else if change < -FLAT_THRESHOLD {
        TrendDirection::Falling
    } else {
        TrendDirection::Flat
    };

    let risk_level = if mean_confidence >= 0.8 {
        RiskLevel::Low
    } else if mean_confidence >= 0.5 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    };

    Some(ForecastSummary {
        steps: results.len(),
        total_predicted,
        average_predicted,
        mean_confidence,
        trend,
        risk_level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use forecast_core::AlgorithmType;
    use rust_decimal_macros::dec;

    fn result(i: usize, amount: Decimal, confidence: f64) -> ForecastResult {
        ForecastResult {
            date: NaiveDate::from_ymd_opt(2024, 1, 1 + i as u32).unwrap(),
            predicted_amount: amount,
            confidence_score: confidence,
            algorithm: AlgorithmType::LinearRegression,
            horizon_index: i,
        }
    }

    #[test]
    fn test_summary_rising() {
        let results = vec![
            result(0, dec!(100), 0.9),
            result(1, dec!(110), 0.85),
            result(2, dec!(120), 0.95),
        ];
        let summary = summarize(&results).unwrap();
        assert_eq!(summary.steps, 3);
        assert_eq!(summary.total_predicted, dec!(330));
        assert_eq!(summary.average_predicted, dec!(110));
        assert!((summary.mean_confidence - 0.9).abs() < 1e-9);
        assert_eq!(summary.trend, TrendDirection::Rising);
        assert_eq!(summary.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_summary_flat_and_falling() {
        let flat = vec![result(0, dec!(50), 0.6), result(1, dec!(50.1), 0.6)];
        let summary = summarize(&flat).unwrap();
        assert_eq!(summary.trend, TrendDirection::Flat);
        assert_eq!(summary.risk_level, RiskLevel::Medium);

        let falling = vec![result(0, dec!(-20), 0.2), result(1, dec!(-40), 0.2)];
        let summary = summarize(&falling).unwrap();
        assert_eq!(summary.trend, TrendDirection::Falling);
        assert_eq!(summary.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_summary_empty() {
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn test_summary_total_overflow() {
        let results = vec![result(0, Decimal::MAX, 0.9), result(1, Decimal::MAX, 0.9)];
        assert!(summarize(&results).is_none());
    }
}
