//! Simple moving-average forecaster.
//!
//! The one technique cheap enough to run in-process: the prediction for
//! any horizon is the mean of the last `window` closes. Abstains when
//! the history is shorter than the window.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;

use super::{Forecaster, PriceHistory};
use crate::types::ForecastSource;

/// Default averaging window, in trading days.
pub const DEFAULT_WINDOW: usize = 20;

/// Calendar-day multiplier when fetching history, so weekends and
/// holidays don't starve the window.
const FETCH_BUFFER: i64 = 2;

pub struct SmaForecaster {
    prices: Arc<dyn PriceHistory>,
    window: usize,
}

impl SmaForecaster {
    pub fn new(prices: Arc<dyn PriceHistory>, window: usize) -> Self {
        Self {
            prices,
            window: window.max(1),
        }
    }
}

#[async_trait]
impl Forecaster for SmaForecaster {
    async fn forecast(&self, symbol: &str, _horizon_days: u32) -> Result<Option<f64>> {
        let since = Utc::now().date_naive() - Duration::days(self.window as i64 * FETCH_BUFFER);
        let history = self.prices.get_prices(symbol, since).await?;

        if history.len() < self.window {
            return Ok(None);
        }

        let tail = &history[history.len() - self.window..];
        let mean = tail.iter().map(|p| p.close).sum::<f64>() / self.window as f64;
        Ok(Some(mean))
    }

    fn source(&self) -> ForecastSource {
        ForecastSource::Ma
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
