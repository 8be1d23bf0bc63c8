//! Retrospective accuracy scoring for the forecasting algorithms.

pub mod engine;
pub mod metrics;


pub use engine::{simulate_anchors, BacktestEngine, BacktestReport};
pub use metrics::AccuracyMetrics;
