//! Persistence gateway.
//!
//! A keyed upsert store for forecasts and accuracy records, injected
//! into the engine as an explicit dependency so tests can swap in the
//! in-memory fake. Every write is a single atomic upsert — a record is
//! either fully replaced or untouched, never half-updated.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::types::{AccuracyRecord, EngineError, EnsembleForecast};

/// A transient storage failure (connectivity, lock, timeout).
///
/// Callers retry these a bounded number of times; exhaustion marks the
/// symbol's write failed for the run without touching other symbols.
#[derive(Debug, thiserror::Error)]
#[error("Storage failure: {0}")]
pub struct StorageError(pub String);

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        EngineError::Storage(e.0)
    }
}

/// Abstraction over the forecast/accuracy store.
#[async_trait]
pub trait ForecastStore: Send + Sync {
    /// Upsert keyed by (symbol, target date, horizon). Last write wins.
    async fn upsert_forecast(&self, forecast: &EnsembleForecast) -> Result<(), StorageError>;

    /// Upsert keyed by (symbol, hourly run bucket). Last write wins.
    async fn upsert_accuracy(&self, record: &AccuracyRecord) -> Result<(), StorageError>;

    /// Forecasts for one symbol with a target date in `[from, to]`,
    /// ascending by target date then horizon.
    async fn forecasts_in_window(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<EnsembleForecast>, StorageError>;

    /// Accuracy records (all symbols) evaluated at or after `since`.
    async fn recent_accuracy(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<AccuracyRecord>, StorageError>;
}
