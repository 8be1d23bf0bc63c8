use chrono::NaiveDate;
use forecast_core::{to_amount, AlgorithmType, ForecastError, ForecastResult, PeriodUnit};

use crate::confidence::{clamp_confidence, ConfidenceModel};

/// Turns raw algorithm output into dated, confidence-annotated results.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAssembler {
    pub period: PeriodUnit,
}

impl ResultAssembler {
    pub fn new(period: PeriodUnit) -> Self {
        Self { period }
    }

    /// Value `i` is dated `start_date + i * period` and gets `horizon_index = i`.
    pub fn assemble(
        &self,
        raw_forecast: &[f64],
        start_date: NaiveDate,
        algorithm: AlgorithmType,
        confidence: &dyn ConfidenceModel,
    ) -> Result<Vec<ForecastResult>, ForecastError> {
        raw_forecast
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let date = self.period.advance(start_date, i as u32).ok_or_else(|| {
                    ForecastError::Computation(format!(
                        "forecast date overflow at step {} from {}",
                        i, start_date
                    ))
                })?;

                Ok(ForecastResult {
                    date,
                    predicted_amount: to_amount(*value)?,
                    confidence_score: clamp_confidence(confidence.score(algorithm, i)),
                    algorithm,
                    horizon_index: i,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::ConstantConfidence;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_assemble_daily() {
        let assembler = ResultAssembler::new(PeriodUnit::Daily);
        let results = assembler
            .assemble(
                &[130.0, 131.5],
                date(2024, 3, 1),
                AlgorithmType::Sma,
                &ConstantConfidence(0.6),
            )
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].date, date(2024, 3, 1));
        assert_eq!(results[1].date, date(2024, 3, 2));
        assert_eq!(results[1].predicted_amount, dec!(131.5));
        assert_eq!(results[1].horizon_index, 1);
        assert_eq!(results[0].algorithm, AlgorithmType::Sma);
        assert_eq!(results[0].confidence_score, 0.6);
    }

    #[test]
    fn test_assemble_monthly_and_weekly_dates() {
        let monthly = ResultAssembler::new(PeriodUnit::Monthly)
            .assemble(
                &[1.0, 2.0, 3.0],
                date(2024, 1, 31),
                AlgorithmType::LinearRegression,
                &ConstantConfidence(0.5),
            )
            .unwrap();
        assert_eq!(monthly[1].date, date(2024, 2, 29));
        assert_eq!(monthly[2].date, date(2024, 3, 31));

        let weekly = ResultAssembler::new(PeriodUnit::Weekly)
            .assemble(
                &[1.0, 2.0],
                date(2024, 1, 1),
                AlgorithmType::Ewma,
                &ConstantConfidence(0.5),
            )
            .unwrap();
        assert_eq!(weekly[1].date, date(2024, 1, 8));
    }

    #[test]
    fn test_confidence_is_clamped() {
        let results = ResultAssembler::default()
            .assemble(
                &[1.0, 2.0],
                date(2024, 1, 1),
                AlgorithmType::Sma,
                &|_: AlgorithmType, i: usize| if i == 0 { 3.0 } else { -1.0 },
            )
            .unwrap();
        assert_eq!(results[0].confidence_score, 1.0);
        assert_eq!(results[1].confidence_score, 0.0);
    }

    #[test]
    fn test_non_finite_value_is_computation_error() {
        let err = ResultAssembler::default()
            .assemble(
                &[f64::INFINITY],
                date(2024, 1, 1),
                AlgorithmType::Sma,
                &ConstantConfidence(0.5),
            )
            .unwrap_err();
        assert!(matches!(err, ForecastError::Computation(_)));
    }
}
