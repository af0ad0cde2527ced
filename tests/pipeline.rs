//! End-to-end pipeline tests.
//!
//! Drives the whole engine — forecast pass, accuracy pass, reporting —
//! against deterministic in-memory collaborators. No network, no disk.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;

use foresight::engine::{EngineOptions, EnsembleEngine};
use foresight::providers::{Forecaster, ForecasterSet, PriceHistory, SentimentFeed};
use foresight::report;
use foresight::storage::memory::MemoryStore;
use foresight::storage::ForecastStore;
use foresight::types::{
    AccuracyTier, ForecastSource, PricePoint, SentimentSummary, SentimentTrend,
};

// ---------------------------------------------------------------------------
// Deterministic collaborators
// ---------------------------------------------------------------------------

/// A price history with one close per calendar day, linearly rising.
struct StaticPrices {
    start: NaiveDate,
    days: i64,
    base: f64,
    step: f64,
}

impl StaticPrices {
    fn close_on(&self, date: NaiveDate) -> Option<f64> {
        let offset = (date - self.start).num_days();
        if offset < 0 || offset >= self.days {
            return None;
        }
        Some(self.base + offset as f64 * self.step)
    }
}

#[async_trait]
impl PriceHistory for StaticPrices {
    async fn get_prices(&self, symbol: &str, since: NaiveDate) -> Result<Vec<PricePoint>> {
        Ok((0..self.days)
            .filter_map(|offset| {
                let trade_date = self.start + Duration::days(offset);
                if trade_date < since {
                    return None;
                }
                self.close_on(trade_date).map(|close| PricePoint {
                    symbol: symbol.to_string(),
                    trade_date,
                    close,
                })
            })
            .collect())
    }
}

/// A forecaster that always answers the same price.
struct StaticForecaster {
    source: ForecastSource,
    prediction: Option<f64>,
}

#[async_trait]
impl Forecaster for StaticForecaster {
    async fn forecast(&self, _symbol: &str, _horizon_days: u32) -> Result<Option<f64>> {
        Ok(self.prediction)
    }

    fn source(&self) -> ForecastSource {
        self.source
    }
}

/// A sentiment feed that always answers the same summary.
struct StaticSentiment {
    average: f64,
    strength: f64,
    news_count: u32,
}

#[async_trait]
impl SentimentFeed for StaticSentiment {
    async fn get_sentiment(
        &self,
        symbol: &str,
        as_of: NaiveDate,
    ) -> Result<Option<SentimentSummary>> {
        Ok(Some(SentimentSummary {
            symbol: symbol.to_string(),
            as_of,
            average: self.average,
            strength: self.strength,
            trend: SentimentTrend::Bullish,
            news_count: self.news_count,
        }))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// 60 days of history ending today, flat at `last_close`.
fn flat_prices(last_close: f64) -> Arc<dyn PriceHistory> {
    Arc::new(StaticPrices {
        start: today() - Duration::days(59),
        days: 60,
        base: last_close,
        step: 0.0,
    })
}

fn fixed(source: ForecastSource, prediction: f64) -> Arc<dyn Forecaster> {
    Arc::new(StaticForecaster {
        source,
        prediction: Some(prediction),
    })
}

fn full_set() -> ForecasterSet {
    ForecasterSet::default()
        .with(ForecastSource::Lstm, fixed(ForecastSource::Lstm, 1010.0))
        .with(ForecastSource::Arima, fixed(ForecastSource::Arima, 990.0))
        .with(ForecastSource::Ma, fixed(ForecastSource::Ma, 1000.0))
}

fn test_options() -> EngineOptions {
    EngineOptions {
        retry_base_delay_ms: 1,
        ..EngineOptions::default()
    }
}

fn symbols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Forecast pass
// ---------------------------------------------------------------------------

#[tokio::test]
async fn forecast_pass_persists_combined_and_adjusted_prices() {
    let store = Arc::new(MemoryStore::new());
    let engine = EnsembleEngine::new(
        flat_prices(1000.0),
        full_set(),
        Some(Arc::new(StaticSentiment {
            average: 0.5,
            strength: 0.8,
            news_count: 10,
        })),
        store.clone(),
        test_options(),
    );

    let summary = engine.run_forecast_pass(&symbols(&["ACME"]), &[1, 7]).await;
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(store.forecast_count(), 2);

    let fc = store
        .get_forecast("ACME", today() + Duration::days(7), 7)
        .expect("7-day forecast stored");

    // 1010×0.5 + 990×0.3 + 1000×0.2 = 1002, then a +2% sentiment nudge
    assert!((fc.combined_price - 1002.0).abs() < 1e-9);
    assert!((fc.adjusted_price - 1022.04).abs() < 1e-9);
    assert!((fc.confidence - 0.99).abs() < 1e-9);
    assert_eq!(fc.sentiment_applied, Some(0.5));
    assert_eq!(fc.sentiment_impact, Some(0.4));
    assert_eq!(fc.sources.lstm, Some(1010.0));
}

#[tokio::test]
async fn forecast_pass_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let engine = EnsembleEngine::new(
        flat_prices(1000.0),
        full_set(),
        None,
        store.clone(),
        test_options(),
    );

    engine.run_forecast_pass(&symbols(&["ACME"]), &[7]).await;
    let first = store
        .get_forecast("ACME", today() + Duration::days(7), 7)
        .unwrap();

    engine.run_forecast_pass(&symbols(&["ACME"]), &[7]).await;
    let second = store
        .get_forecast("ACME", today() + Duration::days(7), 7)
        .unwrap();

    assert_eq!(store.forecast_count(), 1);
    assert_eq!(first.combined_price, second.combined_price);
    assert_eq!(first.adjusted_price, second.adjusted_price);
    assert_eq!(first.confidence, second.confidence);
    assert_eq!(first.sources, second.sources);
}

#[tokio::test]
async fn forecast_pass_isolates_symbol_failures() {
    // Three symbols; two storage failures exhaust no symbol because the
    // engine retries up to three times per write.
    let store = Arc::new(MemoryStore::new());
    store.fail_next_writes(2);

    let engine = EnsembleEngine::new(
        flat_prices(1000.0),
        full_set(),
        None,
        store.clone(),
        EngineOptions {
            max_concurrent_symbols: 1,
            ..test_options()
        },
    );

    let summary = engine
        .run_forecast_pass(&symbols(&["ACME", "GLOBEX", "INITECH"]), &[7])
        .await;
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(store.forecast_count(), 3);
}

// ---------------------------------------------------------------------------
// Accuracy pass
// ---------------------------------------------------------------------------

/// Rising history whose closes the forecasts predicted exactly, so the
/// evaluation comes out perfect.
async fn seed_perfect_history(store: &MemoryStore, prices: &StaticPrices) {
    for days_ago in 1..=5 {
        let target = today() - Duration::days(days_ago);
        let close = prices.close_on(target).unwrap();
        let fc = foresight::types::EnsembleForecast {
            symbol: "ACME".to_string(),
            target_date: target,
            horizon_days: 1,
            current_price: close,
            sources: foresight::types::SourceForecasts {
                lstm: Some(close),
                arima: None,
                ma: None,
            },
            combined_price: close,
            confidence: 0.33,
            sentiment_applied: None,
            sentiment_impact: None,
            adjusted_price: close,
            created_at: Utc::now(),
        };
        store.upsert_forecast(&fc).await.unwrap();
    }
}

#[tokio::test]
async fn accuracy_pass_scores_perfect_forecasts_at_full_marks() {
    let prices = StaticPrices {
        start: today() - Duration::days(59),
        days: 60,
        base: 100.0,
        step: 1.0,
    };
    let store = Arc::new(MemoryStore::new());
    seed_perfect_history(&store, &prices).await;

    let engine = EnsembleEngine::new(
        Arc::new(prices),
        ForecasterSet::default(),
        None,
        store.clone(),
        test_options(),
    );

    let summary = engine.run_accuracy_pass(&symbols(&["ACME"]), 30).await;
    assert_eq!(summary.processed, 1);

    let records = store
        .recent_accuracy(Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.sample_size, 5);
    assert_eq!(record.mae, 0.0);
    assert_eq!(record.rmse, 0.0);
    assert_eq!(record.mape, 0.0);
    assert!((record.r_squared - 1.0).abs() < 1e-12);
    assert!((record.directional_accuracy - 100.0).abs() < 1e-12);
    assert!((record.confidence - 100.0).abs() < 1e-12);
    assert_eq!(record.tier(), AccuracyTier::Excellent);
}

#[tokio::test]
async fn accuracy_pass_skips_symbols_without_history() {
    let store = Arc::new(MemoryStore::new());
    let engine = EnsembleEngine::new(
        flat_prices(1000.0),
        ForecasterSet::default(),
        None,
        store.clone(),
        test_options(),
    );

    let summary = engine
        .run_accuracy_pass(&symbols(&["ACME", "GLOBEX"]), 30)
        .await;
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.processed, 0);
    assert_eq!(store.accuracy_count(), 0);
}

// ---------------------------------------------------------------------------
// Reporting over persisted records
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reporting_reflects_persisted_accuracy() {
    let prices = StaticPrices {
        start: today() - Duration::days(59),
        days: 60,
        base: 100.0,
        step: 1.0,
    };
    let store = Arc::new(MemoryStore::new());
    seed_perfect_history(&store, &prices).await;

    let engine = EnsembleEngine::new(
        Arc::new(prices),
        ForecasterSet::default(),
        None,
        store.clone(),
        test_options(),
    );
    engine.run_accuracy_pass(&symbols(&["ACME"]), 30).await;

    let records = store
        .recent_accuracy(Utc::now() - Duration::hours(24))
        .await
        .unwrap();

    let trend = report::hourly_trend(&records);
    assert_eq!(trend.len(), 1);
    assert_eq!(trend[0].symbol_count, 1);
    assert!((trend[0].avg_confidence - 100.0).abs() < 1e-12);

    let board = report::leaderboard(&records, 10);
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].symbol, "ACME");
    assert_eq!(board[0].tier, AccuracyTier::Excellent);
}
