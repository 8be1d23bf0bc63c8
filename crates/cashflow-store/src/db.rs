use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use forecast_core::{
    AlgorithmType, BacktestAccuracyRecord, ForecastError, ForecastResult, ResultStore,
    TimeSeriesPoint, TransactionStore,
};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::models::{net_daily_series, NewTransaction, TransactionKind};

/// SQLite-backed transaction source and forecast sink.
#[derive(Clone)]
pub struct CashflowDb {
    pool: SqlitePool,
}

impl CashflowDb {
    /// Open (creating if missing) the database and apply the schema.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every connection to `sqlite::memory:` is its own database.
        let in_memory = database_url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;

        Ok(db)
    }

    async fn init_schema(&self) -> Result<()> {
        let schema = include_str!("../schema.sql");

        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await?;
            }
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn create_user(&self, username: &str) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as("INSERT INTO users (username) VALUES (?) RETURNING id")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("failed to create user '{}'", username))?;
        Ok(id)
    }

    pub async fn find_user(&self, username: &str) -> Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn user_exists(&self, user_id: i64) -> Result<bool> {
        let found = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Insert transactions in one database transaction; returns the number inserted.
    pub async fn insert_transactions(
        &self,
        user_id: i64,
        transactions: &[NewTransaction],
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for t in transactions {
            let result = sqlx::query(
                "INSERT INTO transactions (user_id, kind, amount, occurred_on, description)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(t.kind.as_str())
            .bind(t.amount.to_string())
            .bind(t.date)
            .bind(&t.description)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        tracing::info!(user_id, inserted, "Imported transactions");
        Ok(inserted)
    }

    /// Daily net flow for `start <= date < end`.
    pub async fn net_series(
        &self,
        user_id: i64,
        start: Option<NaiveDate>,
        end: NaiveDate,
    ) -> Result<Vec<TimeSeriesPoint>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT occurred_on, kind, amount FROM transactions
             WHERE user_id = ? AND occurred_on < ? AND (? IS NULL OR occurred_on >= ?)
             ORDER BY occurred_on, id",
        )
        .bind(user_id)
        .bind(end)
        .bind(start)
        .bind(start)
        .fetch_all(&self.pool)
        .await?;

        let flows = rows
            .into_iter()
            .map(|r| {
                let kind: TransactionKind = r.kind.parse()?;
                Ok((r.occurred_on, kind.signed(parse_decimal(&r.amount)?)))
            })
            .collect::<Result<Vec<_>>>()?;

        net_daily_series(flows)
    }

    pub async fn save_forecast_results(
        &self,
        user_id: i64,
        results: &[ForecastResult],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for r in results {
            sqlx::query(
                "INSERT INTO forecast_results (
                    user_id, forecast_date, predicted_amount, confidence_score,
                    algorithm, horizon_index
                ) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(r.date)
            .bind(r.predicted_amount.to_string())
            .bind(r.confidence_score)
            .bind(r.algorithm.as_str())
            .bind(r.horizon_index as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn save_accuracy_records(
        &self,
        user_id: i64,
        records: &[BacktestAccuracyRecord],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for r in records {
            sqlx::query(
                "INSERT INTO accuracy_records (
                    user_id, anchor_date, horizon_days, algorithm, predicted_amount,
                    actual_amount, absolute_error, percentage_error, confidence_score
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(r.anchor_date)
            .bind(r.horizon_days as i64)
            .bind(r.algorithm.as_str())
            .bind(r.predicted_amount.to_string())
            .bind(r.actual_amount.to_string())
            .bind(r.absolute_error.to_string())
            .bind(r.percentage_error)
            .bind(r.confidence_score)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Stored forecasts dated strictly after `after`, soonest first.
    pub async fn upcoming_forecasts(
        &self,
        user_id: i64,
        after: NaiveDate,
    ) -> Result<Vec<ForecastResult>> {
        let rows = sqlx::query_as::<_, ForecastRow>(
            "SELECT forecast_date, predicted_amount, confidence_score, algorithm, horizon_index
             FROM forecast_results WHERE user_id = ? AND forecast_date > ?
             ORDER BY forecast_date ASC, id ASC",
        )
        .bind(user_id)
        .bind(after)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ForecastRow::into_result).collect()
    }

    /// Stored forecasts with confidence of at least 0.8, most confident first.
    pub async fn high_confidence_forecasts(&self, user_id: i64) -> Result<Vec<ForecastResult>> {
        let rows = sqlx::query_as::<_, ForecastRow>(
            "SELECT forecast_date, predicted_amount, confidence_score, algorithm, horizon_index
             FROM forecast_results WHERE user_id = ? AND confidence_score >= 0.8
             ORDER BY confidence_score DESC, forecast_date ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ForecastRow::into_result).collect()
    }

    pub async fn average_confidence(&self, user_id: i64) -> Result<Option<f64>> {
        let avg = sqlx::query_scalar::<_, Option<f64>>(
            "SELECT AVG(confidence_score) FROM forecast_results WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(avg)
    }

    pub async fn average_backtest_confidence(
        &self,
        user_id: i64,
        algorithm: AlgorithmType,
    ) -> Result<Option<f64>> {
        let avg = sqlx::query_scalar::<_, Option<f64>>(
            "SELECT AVG(confidence_score) FROM accuracy_records
             WHERE user_id = ? AND algorithm = ?",
        )
        .bind(user_id)
        .bind(algorithm.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(avg)
    }

    pub async fn accuracy_records(
        &self,
        user_id: i64,
        algorithm: AlgorithmType,
    ) -> Result<Vec<BacktestAccuracyRecord>> {
        let rows = sqlx::query_as::<_, AccuracyRow>(
            "SELECT anchor_date, horizon_days, algorithm, predicted_amount, actual_amount,
                    absolute_error, percentage_error, confidence_score
             FROM accuracy_records WHERE user_id = ? AND algorithm = ?
             ORDER BY anchor_date ASC, id ASC",
        )
        .bind(user_id)
        .bind(algorithm.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AccuracyRow::into_record).collect()
    }
}

fn storage_error(e: anyhow::Error) -> ForecastError {
    ForecastError::Storage(format!("{:#}", e))
}

#[async_trait]
impl TransactionStore for CashflowDb {
    async fn fetch_series(
        &self,
        user_id: i64,
        start: Option<NaiveDate>,
        end: NaiveDate,
    ) -> Result<Vec<TimeSeriesPoint>, ForecastError> {
        if !self.user_exists(user_id).await.map_err(storage_error)? {
            return Err(ForecastError::UserNotFound(user_id));
        }
        self.net_series(user_id, start, end)
            .await
            .map_err(storage_error)
    }
}

#[async_trait]
impl ResultStore for CashflowDb {
    async fn store_forecast_results(
        &self,
        user_id: i64,
        results: &[ForecastResult],
    ) -> Result<(), ForecastError> {
        self.save_forecast_results(user_id, results)
            .await
            .map_err(storage_error)
    }

    async fn store_accuracy_records(
        &self,
        user_id: i64,
        records: &[BacktestAccuracyRecord],
    ) -> Result<(), ForecastError> {
        self.save_accuracy_records(user_id, records)
            .await
            .map_err(storage_error)
    }

    async fn historical_confidence(
        &self,
        user_id: i64,
        algorithm: AlgorithmType,
    ) -> Result<Option<f64>, ForecastError> {
        self.average_backtest_confidence(user_id, algorithm)
            .await
            .map_err(storage_error)
    }
}

fn parse_decimal(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).with_context(|| format!("invalid stored amount '{}'", raw))
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    occurred_on: NaiveDate,
    kind: String,
    amount: String,
}

#[derive(sqlx::FromRow)]
struct ForecastRow {
    forecast_date: NaiveDate,
    predicted_amount: String,
    confidence_score: f64,
    algorithm: String,
    horizon_index: i64,
}

impl ForecastRow {
    fn into_result(self) -> Result<ForecastResult> {
        Ok(ForecastResult {
            date: self.forecast_date,
            predicted_amount: parse_decimal(&self.predicted_amount)?,
            confidence_score: self.confidence_score,
            algorithm: self.algorithm.parse::<AlgorithmType>()?,
            horizon_index: usize::try_from(self.horizon_index)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AccuracyRow {
    anchor_date: NaiveDate,
    horizon_days: i64,
    algorithm: String,
    predicted_amount: String,
    actual_amount: String,
    absolute_error: String,
    percentage_error: Option<f64>,
    confidence_score: f64,
}

impl AccuracyRow {
    fn into_record(self) -> Result<BacktestAccuracyRecord> {
        Ok(BacktestAccuracyRecord {
            anchor_date: self.anchor_date,
            horizon_days: u32::try_from(self.horizon_days)?,
            algorithm: self.algorithm.parse::<AlgorithmType>()?,
            predicted_amount: parse_decimal(&self.predicted_amount)?,
            actual_amount: parse_decimal(&self.actual_amount)?,
            absolute_error: parse_decimal(&self.absolute_error)?,
            percentage_error: self.percentage_error,
            confidence_score: self.confidence_score,
        })
    }
}
