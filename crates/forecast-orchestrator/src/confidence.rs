use std::sync::Arc;

use forecast_core::{AlgorithmType, ResultStore};

use crate::settings::ForecastSettings;

/// Confidence attached to each assembled forecast step.
pub trait ConfidenceModel: Send + Sync {
    fn score(&self, algorithm: AlgorithmType, horizon_index: usize) -> f64;
}

impl<F> ConfidenceModel for F
where
    F: Fn(AlgorithmType, usize) -> f64 + Send + Sync,
{
    fn score(&self, algorithm: AlgorithmType, horizon_index: usize) -> f64 {
        self(algorithm, horizon_index)
    }
}

/// Same score for every step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantConfidence(pub f64);

impl ConfidenceModel for ConstantConfidence {
    fn score(&self, _algorithm: AlgorithmType, _horizon_index: usize) -> f64 {
        self.0
    }
}

/// Linearly decreasing confidence the further out the step is, never below `floor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizonDecay {
    pub base: f64,
    pub decay_per_step: f64,
    pub floor: f64,
}

impl ConfidenceModel for HorizonDecay {
    fn score(&self, _algorithm: AlgorithmType, horizon_index: usize) -> f64 {
        (self.base - self.decay_per_step * horizon_index as f64).max(self.floor)
    }
}

/// Clamp into `[0, 1]`; NaN maps to 0.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Picks the confidence model for a (user, algorithm) pair.
///
/// Precedence: an explicit override, then persisted backtest history (when
/// enabled in settings), then the settings default.
#[derive(Clone)]
pub struct ConfidenceResolver {
    settings: ForecastSettings,
    store: Option<Arc<dyn ResultStore>>,
    override_model: Option<Arc<dyn ConfidenceModel>>,
}

impl ConfidenceResolver {
    pub fn new(
        settings: ForecastSettings,
        store: Option<Arc<dyn ResultStore>>,
        override_model: Option<Arc<dyn ConfidenceModel>>,
    ) -> Self {
        Self {
            settings,
            store,
            override_model,
        }
    }

    pub async fn resolve(&self, user_id: i64, algorithm: AlgorithmType) -> Arc<dyn ConfidenceModel> {
        if let Some(model) = &self.override_model {
            return Arc::clone(model);
        }

        if self.settings.use_accuracy_history {
            if let Some(store) = &self.store {
                match store.historical_confidence(user_id, algorithm).await {
                    Ok(Some(score)) => {
                        tracing::debug!(
                            user_id,
                            %algorithm,
                            score,
                            "Using backtest-derived confidence"
                        );
                        return Arc::new(ConstantConfidence(score));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(
                            user_id,
                            %algorithm,
                            "Failed to load accuracy history, using default confidence: {}",
                            e
                        );
                    }
                }
            }
        }

        self.settings.default_confidence_model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_confidence() {
        assert_eq!(clamp_confidence(1.7), 1.0);
        assert_eq!(clamp_confidence(-0.2), 0.0);
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
        assert_eq!(clamp_confidence(0.42), 0.42);
    }

    #[test]
    fn test_horizon_decay_respects_floor() {
        let model = HorizonDecay {
            base: 0.9,
            decay_per_step: 0.1,
            floor: 0.5,
        };
        assert!((model.score(AlgorithmType::Sma, 0) - 0.9).abs() < 1e-12);
        assert!((model.score(AlgorithmType::Sma, 2) - 0.7).abs() < 1e-12);
        assert_eq!(model.score(AlgorithmType::Sma, 10), 0.5);
    }

    #[test]
    fn test_closure_model() {
        let model = |algorithm: AlgorithmType, _i: usize| match algorithm {
            AlgorithmType::Ewma => 0.3,
            _ => 0.6,
        };
        assert_eq!(model.score(AlgorithmType::Ewma, 4), 0.3);
        assert_eq!(model.score(AlgorithmType::Sma, 4), 0.6);
    }

    #[tokio::test]
    async fn test_resolver_prefers_override() {
        let resolver = ConfidenceResolver::new(
            ForecastSettings::default(),
            None,
            Some(Arc::new(ConstantConfidence(0.11))),
        );
        let model = resolver.resolve(1, AlgorithmType::Sma).await;
        assert_eq!(model.score(AlgorithmType::Sma, 0), 0.11);
    }

    #[tokio::test]
    async fn test_resolver_falls_back_to_default() {
        let settings = ForecastSettings::default();
        let expected = settings.default_confidence;
        let resolver = ConfidenceResolver::new(settings, None, None);
        let model = resolver.resolve(1, AlgorithmType::LinearRegression).await;
        assert_eq!(model.score(AlgorithmType::LinearRegression, 0), expected);
    }
}
