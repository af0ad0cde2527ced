//! SQLite persistence gateway.
//!
//! Backs the store with a `sqlx` connection pool. The schema is created
//! on connect; upserts are single `INSERT … ON CONFLICT DO UPDATE`
//! statements so a record can never be observed half-written.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;

use super::{ForecastStore, StorageError};
use crate::providers::PriceHistory;
use crate::types::{AccuracyRecord, EnsembleForecast, PricePoint, SourceForecasts};

const MAX_CONNECTIONS: u32 = 5;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS price_points (
        symbol      TEXT NOT NULL,
        trade_date  DATE NOT NULL,
        close       REAL NOT NULL,
        PRIMARY KEY (symbol, trade_date)
    )",
    "CREATE TABLE IF NOT EXISTS ensemble_forecasts (
        symbol            TEXT NOT NULL,
        target_date       DATE NOT NULL,
        horizon_days      INTEGER NOT NULL,
        current_price     REAL NOT NULL,
        lstm_price        REAL,
        arima_price       REAL,
        ma_price          REAL,
        combined_price    REAL NOT NULL,
        confidence        REAL NOT NULL,
        sentiment_applied REAL,
        sentiment_impact  REAL,
        adjusted_price    REAL NOT NULL,
        created_at        TEXT NOT NULL,
        PRIMARY KEY (symbol, target_date, horizon_days)
    )",
    "CREATE TABLE IF NOT EXISTS accuracy_records (
        symbol               TEXT NOT NULL,
        run_bucket           TEXT NOT NULL,
        evaluated_at         TEXT NOT NULL,
        mae                  REAL NOT NULL,
        rmse                 REAL NOT NULL,
        mape                 REAL NOT NULL,
        r_squared            REAL NOT NULL,
        directional_accuracy REAL NOT NULL,
        sample_size          INTEGER NOT NULL,
        confidence           REAL NOT NULL,
        PRIMARY KEY (symbol, run_bucket)
    )",
];

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if necessary) the database at `database_url` and
    /// ensure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {database_url}"))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {database_url}"))?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .context("Failed to create schema")?;
        }

        info!(database_url, "SQLite store ready");
        Ok(Self { pool })
    }

    /// Append a closing price. Prices are immutable once recorded, so a
    /// duplicate (symbol, date) insert is ignored rather than updated.
    pub async fn record_price(&self, point: &PricePoint) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT OR IGNORE INTO price_points (symbol, trade_date, close) VALUES (?, ?, ?)",
        )
        .bind(&point.symbol)
        .bind(point.trade_date)
        .bind(point.close)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError(e.to_string()))?;
        Ok(())
    }

    fn row_to_forecast(row: &SqliteRow) -> Result<EnsembleForecast, sqlx::Error> {
        Ok(EnsembleForecast {
            symbol: row.try_get("symbol")?,
            target_date: row.try_get("target_date")?,
            horizon_days: row.try_get::<i64, _>("horizon_days")? as u32,
            current_price: row.try_get("current_price")?,
            sources: SourceForecasts {
                lstm: row.try_get("lstm_price")?,
                arima: row.try_get("arima_price")?,
                ma: row.try_get("ma_price")?,
            },
            combined_price: row.try_get("combined_price")?,
            confidence: row.try_get("confidence")?,
            sentiment_applied: row.try_get("sentiment_applied")?,
            sentiment_impact: row.try_get("sentiment_impact")?,
            adjusted_price: row.try_get("adjusted_price")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_record(row: &SqliteRow) -> Result<AccuracyRecord, sqlx::Error> {
        Ok(AccuracyRecord {
            symbol: row.try_get("symbol")?,
            evaluated_at: row.try_get("evaluated_at")?,
            mae: row.try_get("mae")?,
            rmse: row.try_get("rmse")?,
            mape: row.try_get("mape")?,
            r_squared: row.try_get("r_squared")?,
            directional_accuracy: row.try_get("directional_accuracy")?,
            sample_size: row.try_get::<i64, _>("sample_size")? as u32,
            confidence: row.try_get("confidence")?,
        })
    }
}

#[async_trait]
impl ForecastStore for SqliteStore {
    async fn upsert_forecast(&self, forecast: &EnsembleForecast) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO ensemble_forecasts (
                symbol, target_date, horizon_days, current_price,
                lstm_price, arima_price, ma_price,
                combined_price, confidence,
                sentiment_applied, sentiment_impact, adjusted_price, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (symbol, target_date, horizon_days) DO UPDATE SET
                current_price     = excluded.current_price,
                lstm_price        = excluded.lstm_price,
                arima_price       = excluded.arima_price,
                ma_price          = excluded.ma_price,
                combined_price    = excluded.combined_price,
                confidence        = excluded.confidence,
                sentiment_applied = excluded.sentiment_applied,
                sentiment_impact  = excluded.sentiment_impact,
                adjusted_price    = excluded.adjusted_price,
                created_at        = excluded.created_at",
        )
        .bind(&forecast.symbol)
        .bind(forecast.target_date)
        .bind(forecast.horizon_days as i64)
        .bind(forecast.current_price)
        .bind(forecast.sources.lstm)
        .bind(forecast.sources.arima)
        .bind(forecast.sources.ma)
        .bind(forecast.combined_price)
        .bind(forecast.confidence)
        .bind(forecast.sentiment_applied)
        .bind(forecast.sentiment_impact)
        .bind(forecast.adjusted_price)
        .bind(forecast.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError(e.to_string()))?;
        Ok(())
    }

    async fn upsert_accuracy(&self, record: &AccuracyRecord) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO accuracy_records (
                symbol, run_bucket, evaluated_at,
                mae, rmse, mape, r_squared, directional_accuracy,
                sample_size, confidence
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (symbol, run_bucket) DO UPDATE SET
                evaluated_at         = excluded.evaluated_at,
                mae                  = excluded.mae,
                rmse                 = excluded.rmse,
                mape                 = excluded.mape,
                r_squared            = excluded.r_squared,
                directional_accuracy = excluded.directional_accuracy,
                sample_size          = excluded.sample_size,
                confidence           = excluded.confidence",
        )
        .bind(&record.symbol)
        .bind(record.run_bucket().to_rfc3339())
        .bind(record.evaluated_at)
        .bind(record.mae)
        .bind(record.rmse)
        .bind(record.mape)
        .bind(record.r_squared)
        .bind(record.directional_accuracy)
        .bind(record.sample_size as i64)
        .bind(record.confidence)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError(e.to_string()))?;
        Ok(())
    }

    async fn forecasts_in_window(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<EnsembleForecast>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM ensemble_forecasts
             WHERE symbol = ? AND target_date >= ? AND target_date <= ?
             ORDER BY target_date, horizon_days",
        )
        .bind(symbol)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError(e.to_string()))?;

        rows.iter()
            .map(Self::row_to_forecast)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError(e.to_string()))
    }

    async fn recent_accuracy(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<AccuracyRecord>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM accuracy_records
             WHERE evaluated_at >= ?
             ORDER BY evaluated_at, symbol",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError(e.to_string()))?;

        rows.iter()
            .map(Self::row_to_record)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError(e.to_string()))
    }
}

#[async_trait]
impl PriceHistory for SqliteStore {
    async fn get_prices(&self, symbol: &str, since: NaiveDate) -> Result<Vec<PricePoint>> {
        let rows = sqlx::query(
            "SELECT symbol, trade_date, close FROM price_points
             WHERE symbol = ? AND trade_date >= ?
             ORDER BY trade_date",
        )
        .bind(symbol)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .context("Failed to read price history")?;

        rows.iter()
            .map(|row| {
                Ok(PricePoint {
                    symbol: row.try_get("symbol")?,
                    trade_date: row.try_get("trade_date")?,
                    close: row.try_get("close")?,
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
