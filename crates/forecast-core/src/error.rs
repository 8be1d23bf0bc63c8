use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Insufficient data: need at least {required} points, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Computation error: {0}")]
    Computation(String),

    #[error("Invalid series: {0}")]
    InvalidSeries(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Stable classification of a [`ForecastError`], used in batch error descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InsufficientData,
    InvalidConfig,
    UserNotFound,
    Computation,
    InvalidSeries,
    Storage,
    Cancelled,
}

impl ForecastError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ForecastError::InsufficientData { .. } => ErrorKind::InsufficientData,
            ForecastError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            ForecastError::UserNotFound(_) => ErrorKind::UserNotFound,
            ForecastError::Computation(_) => ErrorKind::Computation,
            ForecastError::InvalidSeries(_) => ErrorKind::InvalidSeries,
            ForecastError::Storage(_) => ErrorKind::Storage,
            ForecastError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether the caller can recover by supplying more history or another algorithm.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ForecastError::InsufficientData { .. })
    }
}
