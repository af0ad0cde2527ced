//! Pass orchestration.
//!
//! Runs the two batch entry points the scheduler calls:
//! `run_forecast_pass` (fetch → combine → adjust → persist) and
//! `run_accuracy_pass` (match → score → persist). Symbols are
//! independent and fan out through a bounded worker pool; within one
//! symbol the steps run strictly sequentially. A symbol that skips or
//! fails never takes the rest of the run with it — the pass always
//! completes and reports aggregate counts.

use chrono::{Duration, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::accuracy;
use crate::ensemble;
use crate::providers::{ForecasterSet, PriceHistory, SentimentFeed};
use crate::storage::{ForecastStore, StorageError};

// ---------------------------------------------------------------------------
// Options & summaries
// ---------------------------------------------------------------------------

/// Tunables for the pass runner.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Worker-pool bound: symbols in flight at once.
    pub max_concurrent_symbols: usize,
    /// Total attempts per storage write (first try included).
    pub storage_retry_attempts: u32,
    /// Base backoff between storage retries; grows linearly per attempt.
    pub retry_base_delay_ms: u64,
    /// Calendar days of history fetched for the current price lookup.
    pub history_days: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_concurrent_symbols: 8,
            storage_retry_attempts: 3,
            retry_base_delay_ms: 200,
            history_days: 60,
        }
    }
}

/// Aggregate outcome of one pass. This is all the caller sees — per-
/// symbol problems live in the logs, never in dialogs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Symbols with at least one record persisted.
    pub processed: usize,
    /// Symbols with nothing to do (no data, abstentions, thin history).
    pub skipped: usize,
    /// Symbols that hit a contract violation or exhausted storage retries.
    pub failed: usize,
}

impl PassSummary {
    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.failed
    }
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} skipped={} failed={}",
            self.processed, self.skipped, self.failed,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolOutcome {
    Processed,
    Skipped,
    Failed,
}

fn summarize(outcomes: impl IntoIterator<Item = SymbolOutcome>) -> PassSummary {
    let mut summary = PassSummary::default();
    for outcome in outcomes {
        match outcome {
            SymbolOutcome::Processed => summary.processed += 1,
            SymbolOutcome::Skipped => summary.skipped += 1,
            SymbolOutcome::Failed => summary.failed += 1,
        }
    }
    summary
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The ensemble forecast & accuracy evaluation engine.
///
/// All collaborators are injected; the engine itself holds no mutable
/// state, so concurrent symbol evaluations need no locking beyond the
/// store's own pool.
pub struct EnsembleEngine {
    prices: Arc<dyn PriceHistory>,
    forecasters: ForecasterSet,
    sentiment: Option<Arc<dyn SentimentFeed>>,
    store: Arc<dyn ForecastStore>,
    options: EngineOptions,
}

impl EnsembleEngine {
    pub fn new(
        prices: Arc<dyn PriceHistory>,
        forecasters: ForecasterSet,
        sentiment: Option<Arc<dyn SentimentFeed>>,
        store: Arc<dyn ForecastStore>,
        options: EngineOptions,
    ) -> Self {
        Self {
            prices,
            forecasters,
            sentiment,
            store,
            options,
        }
    }

    // -- Forecast pass ---------------------------------------------------

    /// Produce and persist ensemble forecasts for every symbol at every
    /// horizon. Safe to re-run: identical inputs overwrite records with
    /// identical values.
    pub async fn run_forecast_pass(&self, symbols: &[String], horizons: &[u32]) -> PassSummary {
        let as_of = Utc::now().date_naive();
        info!(
            symbols = symbols.len(),
            horizons = ?horizons,
            %as_of,
            "Starting forecast pass"
        );

        let outcomes: Vec<SymbolOutcome> = stream::iter(symbols)
            .map(|symbol| self.forecast_symbol(symbol, horizons, as_of))
            .buffer_unordered(self.options.max_concurrent_symbols.max(1))
            .collect()
            .await;

        let summary = summarize(outcomes);
        info!(%summary, "Forecast pass complete");
        summary
    }

    /// The per-symbol pipeline: fetch → gather → combine → adjust → persist.
    async fn forecast_symbol(
        &self,
        symbol: &str,
        horizons: &[u32],
        as_of: NaiveDate,
    ) -> SymbolOutcome {
        if let Some(bad) = horizons.iter().find(|h| **h == 0) {
            error!(symbol, horizon = bad, "Horizon must be >= 1");
            return SymbolOutcome::Failed;
        }

        let since = as_of - Duration::days(self.options.history_days as i64);
        let history = match self.prices.get_prices(symbol, since).await {
            Ok(history) => history,
            Err(e) => {
                warn!(symbol, error = %e, "Price history fetch failed");
                return SymbolOutcome::Failed;
            }
        };

        let Some(latest) = history.last() else {
            debug!(symbol, "No price history, skipping");
            return SymbolOutcome::Skipped;
        };
        let current_price = latest.close;

        // Sentiment is an optional garnish: a feed outage degrades to an
        // unadjusted forecast rather than failing the symbol.
        let sentiment = match &self.sentiment {
            Some(feed) => match feed.get_sentiment(symbol, as_of).await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!(symbol, error = %e, "Sentiment fetch failed, proceeding unadjusted");
                    None
                }
            },
            None => None,
        };

        let mut stored = 0usize;
        for &horizon in horizons {
            let sources = self.forecasters.gather(symbol, horizon).await;
            let target_date = as_of + Duration::days(horizon as i64);

            let forecast = match ensemble::assemble(
                symbol,
                target_date,
                horizon,
                current_price,
                sources,
                sentiment.as_ref(),
                Utc::now(),
            ) {
                Ok(Some(forecast)) => forecast,
                Ok(None) => {
                    debug!(symbol, horizon, "All forecasters abstained");
                    continue;
                }
                Err(e) => {
                    error!(symbol, horizon, error = %e, "Forecast rejected");
                    return SymbolOutcome::Failed;
                }
            };

            match self
                .with_retry("forecast upsert", || self.store.upsert_forecast(&forecast))
                .await
            {
                Ok(()) => {
                    info!(symbol, horizon, forecast = %forecast, "Forecast stored");
                    stored += 1;
                }
                Err(e) => {
                    error!(symbol, horizon, error = %e, "Forecast write failed after retries");
                    return SymbolOutcome::Failed;
                }
            }
        }

        if stored == 0 {
            SymbolOutcome::Skipped
        } else {
            SymbolOutcome::Processed
        }
    }

    // -- Accuracy pass ---------------------------------------------------

    /// Score realized forecasts for every symbol over the trailing
    /// window and persist one accuracy record per symbol.
    pub async fn run_accuracy_pass(&self, symbols: &[String], window_days: u32) -> PassSummary {
        info!(symbols = symbols.len(), window_days, "Starting accuracy pass");

        let outcomes: Vec<SymbolOutcome> = stream::iter(symbols)
            .map(|symbol| self.evaluate_symbol(symbol, window_days))
            .buffer_unordered(self.options.max_concurrent_symbols.max(1))
            .collect()
            .await;

        let summary = summarize(outcomes);
        info!(%summary, "Accuracy pass complete");
        summary
    }

    async fn evaluate_symbol(&self, symbol: &str, window_days: u32) -> SymbolOutcome {
        let now = Utc::now();
        let to = now.date_naive();
        let from = to - Duration::days(window_days as i64);

        let forecasts = match self.store.forecasts_in_window(symbol, from, to).await {
            Ok(forecasts) => forecasts,
            Err(e) => {
                warn!(symbol, error = %e, "Forecast read failed");
                return SymbolOutcome::Failed;
            }
        };
        if forecasts.is_empty() {
            debug!(symbol, "No forecasts in window, skipping");
            return SymbolOutcome::Skipped;
        }

        let prices = match self.prices.get_prices(symbol, from).await {
            Ok(prices) => prices,
            Err(e) => {
                warn!(symbol, error = %e, "Price history fetch failed");
                return SymbolOutcome::Failed;
            }
        };

        let pairs = accuracy::match_pairs(&forecasts, &prices);
        let Some(record) = accuracy::evaluate_pairs(symbol, &pairs, now) else {
            debug!(symbol, matched = pairs.len(), "Not enough matched history, skipping");
            return SymbolOutcome::Skipped;
        };

        match self
            .with_retry("accuracy upsert", || self.store.upsert_accuracy(&record))
            .await
        {
            Ok(()) => {
                info!(symbol, record = %record, "Accuracy record stored");
                SymbolOutcome::Processed
            }
            Err(e) => {
                error!(symbol, error = %e, "Accuracy write failed after retries");
                SymbolOutcome::Failed
            }
        }
    }

    // -- Storage retry ---------------------------------------------------

    /// Run a storage write with bounded, linearly backed-off retries.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let attempts = self.options.storage_retry_attempts.max(1);
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    warn!(what, attempt, error = %e, "Storage write failed, retrying");
                    let delay = self.options.retry_base_delay_ms * attempt as u64;
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
