//! External collaborator interfaces.
//!
//! Defines the read-only seams the engine consumes:
//! - `PriceHistory` — daily closes per symbol
//! - `Forecaster` — one horizon-tagged point estimate per technique
//! - `SentimentFeed` — aggregated news sentiment
//!
//! Forecaster internals (model training, architecture) live behind the
//! `Forecaster` trait; the engine only sees "a price or an abstention".

pub mod rest;
pub mod sma;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;
use tracing::warn;

use crate::types::{ForecastSource, PricePoint, SentimentSummary, SourceForecasts};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Read access to recorded closing prices.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PriceHistory: Send + Sync {
    /// Closes for `symbol` on or after `since`, ascending by date.
    async fn get_prices(&self, symbol: &str, since: NaiveDate) -> Result<Vec<PricePoint>>;
}

/// A single forecasting technique.
///
/// `Ok(None)` is an abstention — the model chose not to predict. Any
/// stochastic behaviour (sampling, retraining) stays behind this trait;
/// the engine downstream is deterministic.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Forecaster: Send + Sync {
    /// Predict the price `horizon_days` ahead, or abstain.
    async fn forecast(&self, symbol: &str, horizon_days: u32) -> Result<Option<f64>>;

    /// Which ensemble slot this forecaster fills.
    fn source(&self) -> ForecastSource;
}

/// Read access to aggregated news sentiment.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SentimentFeed: Send + Sync {
    /// The sentiment summary for `symbol` as of the given date, if the
    /// news pipeline produced one.
    async fn get_sentiment(
        &self,
        symbol: &str,
        as_of: NaiveDate,
    ) -> Result<Option<SentimentSummary>>;
}

// ---------------------------------------------------------------------------
// Forecaster set
// ---------------------------------------------------------------------------

/// The fixed trio of forecaster slots feeding the ensemble.
///
/// A closed structure rather than a registry: every slot is either
/// wired or absent, and `gather` visits them exhaustively.
#[derive(Clone, Default)]
pub struct ForecasterSet {
    pub lstm: Option<Arc<dyn Forecaster>>,
    pub arima: Option<Arc<dyn Forecaster>>,
    pub ma: Option<Arc<dyn Forecaster>>,
}

impl ForecasterSet {
    /// Wire a forecaster into its slot (builder style).
    pub fn with(mut self, source: ForecastSource, forecaster: Arc<dyn Forecaster>) -> Self {
        match source {
            ForecastSource::Lstm => self.lstm = Some(forecaster),
            ForecastSource::Arima => self.arima = Some(forecaster),
            ForecastSource::Ma => self.ma = Some(forecaster),
        }
        self
    }

    /// The forecaster wired for a given slot, if any.
    pub fn get(&self, source: ForecastSource) -> Option<&Arc<dyn Forecaster>> {
        match source {
            ForecastSource::Lstm => self.lstm.as_ref(),
            ForecastSource::Arima => self.arima.as_ref(),
            ForecastSource::Ma => self.ma.as_ref(),
        }
    }

    /// Whether no forecaster is wired at all.
    pub fn is_empty(&self) -> bool {
        self.lstm.is_none() && self.arima.is_none() && self.ma.is_none()
    }

    /// Collect raw predictions from every wired forecaster.
    ///
    /// An adapter failure is logged and treated as an abstention — one
    /// broken model service must not take down the whole symbol when
    /// the others can still carry the ensemble.
    pub async fn gather(&self, symbol: &str, horizon_days: u32) -> SourceForecasts {
        let mut out = SourceForecasts::default();
        for source in ForecastSource::ALL {
            let Some(forecaster) = self.get(*source) else {
                continue;
            };
            match forecaster.forecast(symbol, horizon_days).await {
                Ok(prediction) => out.set(*source, prediction),
                Err(e) => {
                    warn!(
                        symbol,
                        source = %source,
                        error = %e,
                        "Forecaster failed, treating as abstention"
                    );
                }
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_forecaster(source: ForecastSource, prediction: Option<f64>) -> Arc<dyn Forecaster> {
        let mut mock = MockForecaster::new();
        mock.expect_source().return_const(source);
        mock.expect_forecast().returning(move |_, _| Ok(prediction));
        Arc::new(mock)
    }

    fn failing_forecaster(source: ForecastSource) -> Arc<dyn Forecaster> {
        let mut mock = MockForecaster::new();
        mock.expect_source().return_const(source);
        mock.expect_forecast()
            .returning(|_, _| Err(anyhow::anyhow!("model service down")));
        Arc::new(mock)
    }

    #[tokio::test]
    async fn test_gather_collects_present_slots() {
        let set = ForecasterSet::default()
            .with(ForecastSource::Lstm, mock_forecaster(ForecastSource::Lstm, Some(101.0)))
            .with(ForecastSource::Ma, mock_forecaster(ForecastSource::Ma, Some(99.0)));

        let sf = set.gather("ACME", 7).await;
        assert_eq!(sf.lstm, Some(101.0));
        assert_eq!(sf.arima, None); // slot never wired
        assert_eq!(sf.ma, Some(99.0));
    }

    #[tokio::test]
    async fn test_gather_abstention_stays_none() {
        let set = ForecasterSet::default()
            .with(ForecastSource::Arima, mock_forecaster(ForecastSource::Arima, None));

        let sf = set.gather("ACME", 1).await;
        assert!(sf.is_empty());
    }

    #[tokio::test]
    async fn test_gather_adapter_error_treated_as_abstention() {
        let set = ForecasterSet::default()
            .with(ForecastSource::Lstm, failing_forecaster(ForecastSource::Lstm))
            .with(ForecastSource::Ma, mock_forecaster(ForecastSource::Ma, Some(99.0)));

        let sf = set.gather("ACME", 7).await;
        assert_eq!(sf.lstm, None);
        assert_eq!(sf.ma, Some(99.0));
    }

    #[test]
    fn test_forecaster_set_is_empty() {
        assert!(ForecasterSet::default().is_empty());
        let set = ForecasterSet::default()
            .with(ForecastSource::Ma, mock_forecaster(ForecastSource::Ma, None));
        assert!(!set.is_empty());
    }
}
