//! In-memory persistence gateway.
//!
//! A deterministic `ForecastStore` double for tests and dry runs. All
//! state lives behind mutexes; writes can be made to fail on demand to
//! exercise the engine's retry path.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::{ForecastStore, StorageError};
use crate::types::{AccuracyRecord, EnsembleForecast};

type ForecastKey = (String, NaiveDate, u32);
type AccuracyKey = (String, DateTime<Utc>);

#[derive(Default)]
pub struct MemoryStore {
    forecasts: Mutex<HashMap<ForecastKey, EnsembleForecast>>,
    accuracy: Mutex<HashMap<AccuracyKey, AccuracyRecord>>,
    /// Number of upcoming writes that will fail with a transient error.
    failing_writes: Mutex<u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` writes fail (reads are unaffected).
    pub fn fail_next_writes(&self, count: u32) {
        *self.failing_writes.lock().unwrap() = count;
    }

    /// Number of stored forecasts.
    pub fn forecast_count(&self) -> usize {
        self.forecasts.lock().unwrap().len()
    }

    /// Number of stored accuracy records.
    pub fn accuracy_count(&self) -> usize {
        self.accuracy.lock().unwrap().len()
    }

    /// Fetch one forecast by its full key (test convenience).
    pub fn get_forecast(
        &self,
        symbol: &str,
        target_date: NaiveDate,
        horizon_days: u32,
    ) -> Option<EnsembleForecast> {
        self.forecasts
            .lock()
            .unwrap()
            .get(&(symbol.to_string(), target_date, horizon_days))
            .cloned()
    }

    fn check_write_allowed(&self) -> Result<(), StorageError> {
        let mut failing = self.failing_writes.lock().unwrap();
        if *failing > 0 {
            *failing -= 1;
            return Err(StorageError("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ForecastStore for MemoryStore {
    async fn upsert_forecast(&self, forecast: &EnsembleForecast) -> Result<(), StorageError> {
        self.check_write_allowed()?;
        let key = (
            forecast.symbol.clone(),
            forecast.target_date,
            forecast.horizon_days,
        );
        self.forecasts.lock().unwrap().insert(key, forecast.clone());
        Ok(())
    }

    async fn upsert_accuracy(&self, record: &AccuracyRecord) -> Result<(), StorageError> {
        self.check_write_allowed()?;
        let key = (record.symbol.clone(), record.run_bucket());
        self.accuracy.lock().unwrap().insert(key, record.clone());
        Ok(())
    }

    async fn forecasts_in_window(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<EnsembleForecast>, StorageError> {
        let mut out: Vec<EnsembleForecast> = self
            .forecasts
            .lock()
            .unwrap()
            .values()
            .filter(|fc| fc.symbol == symbol && fc.target_date >= from && fc.target_date <= to)
            .cloned()
            .collect();
        out.sort_by_key(|fc| (fc.target_date, fc.horizon_days));
        Ok(out)
    }

    async fn recent_accuracy(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<AccuracyRecord>, StorageError> {
        let mut out: Vec<AccuracyRecord> = self
            .accuracy
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.evaluated_at >= since)
            .cloned()
            .collect();
        out.sort_by_key(|r| (r.evaluated_at, r.symbol.clone()));
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceForecasts;
    use chrono::TimeZone;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn make_forecast(symbol: &str, target: NaiveDate, horizon: u32, price: f64) -> EnsembleForecast {
        EnsembleForecast {
            symbol: symbol.to_string(),
            target_date: target,
            horizon_days: horizon,
            current_price: 100.0,
            sources: SourceForecasts {
                lstm: Some(price),
                arima: None,
                ma: None,
            },
            combined_price: price,
            confidence: 0.33,
            sentiment_applied: None,
            sentiment_impact: None,
            adjusted_price: price,
            created_at: Utc::now(),
        }
    }

    fn make_record(symbol: &str, hour: u32, confidence: f64) -> AccuracyRecord {
        AccuracyRecord {
            symbol: symbol.to_string(),
            evaluated_at: Utc.with_ymd_and_hms(2026, 3, 10, hour, 15, 0).unwrap(),
            mae: 2.0,
            rmse: 2.5,
            mape: 2.0,
            r_squared: 0.8,
            directional_accuracy: 70.0,
            sample_size: 10,
            confidence,
        }
    }

    #[tokio::test]
    async fn test_forecast_upsert_overwrites_same_key() {
        let store = MemoryStore::new();
        store.upsert_forecast(&make_forecast("ACME", date(10), 7, 101.0)).await.unwrap();
        store.upsert_forecast(&make_forecast("ACME", date(10), 7, 105.0)).await.unwrap();

        assert_eq!(store.forecast_count(), 1);
        let fc = store.get_forecast("ACME", date(10), 7).unwrap();
        assert_eq!(fc.combined_price, 105.0);
    }

    #[tokio::test]
    async fn test_forecast_distinct_keys_coexist() {
        let store = MemoryStore::new();
        store.upsert_forecast(&make_forecast("ACME", date(10), 7, 101.0)).await.unwrap();
        store.upsert_forecast(&make_forecast("ACME", date(10), 1, 100.5)).await.unwrap();
        store.upsert_forecast(&make_forecast("GLOBEX", date(10), 7, 55.0)).await.unwrap();
        assert_eq!(store.forecast_count(), 3);
    }

    #[tokio::test]
    async fn test_forecasts_in_window_filters_and_sorts() {
        let store = MemoryStore::new();
        store.upsert_forecast(&make_forecast("ACME", date(12), 7, 103.0)).await.unwrap();
        store.upsert_forecast(&make_forecast("ACME", date(8), 1, 101.0)).await.unwrap();
        store.upsert_forecast(&make_forecast("ACME", date(20), 7, 110.0)).await.unwrap();
        store.upsert_forecast(&make_forecast("GLOBEX", date(9), 1, 50.0)).await.unwrap();

        let window = store.forecasts_in_window("ACME", date(5), date(15)).await.unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].target_date, date(8));
        assert_eq!(window[1].target_date, date(12));
    }

    #[tokio::test]
    async fn test_accuracy_upsert_same_bucket_overwrites() {
        let store = MemoryStore::new();
        let mut first = make_record("ACME", 14, 80.0);
        let mut second = make_record("ACME", 14, 85.0);
        first.evaluated_at = Utc.with_ymd_and_hms(2026, 3, 10, 14, 5, 0).unwrap();
        second.evaluated_at = Utc.with_ymd_and_hms(2026, 3, 10, 14, 55, 0).unwrap();

        store.upsert_accuracy(&first).await.unwrap();
        store.upsert_accuracy(&second).await.unwrap();

        assert_eq!(store.accuracy_count(), 1);
        let records = store.recent_accuracy(Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap())
            .await
            .unwrap();
        assert!((records[0].confidence - 85.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_recent_accuracy_honours_since() {
        let store = MemoryStore::new();
        store.upsert_accuracy(&make_record("ACME", 8, 70.0)).await.unwrap();
        store.upsert_accuracy(&make_record("ACME", 16, 75.0)).await.unwrap();

        let since = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let records = store.recent_accuracy(since).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!((records[0].confidence - 75.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_injected_failures_then_recovery() {
        let store = MemoryStore::new();
        store.fail_next_writes(2);

        let fc = make_forecast("ACME", date(10), 7, 101.0);
        assert!(store.upsert_forecast(&fc).await.is_err());
        assert!(store.upsert_forecast(&fc).await.is_err());
        // Third attempt goes through
        assert!(store.upsert_forecast(&fc).await.is_ok());
        assert_eq!(store.forecast_count(), 1);
    }
}
