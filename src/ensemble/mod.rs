//! Ensemble forecasting — combination and sentiment adjustment.
//!
//! `combiner` merges the per-source point forecasts into a single price
//! with a confidence measure; `sentiment` applies a bounded correction
//! from news sentiment. Both are pure and deterministic so a forecast
//! pass re-run over identical inputs persists identical records.

pub mod combiner;
pub mod sentiment;

use chrono::{DateTime, NaiveDate, Utc};

use crate::types::{EngineError, EnsembleForecast, SentimentSummary, SourceForecasts};

/// Combine raw source forecasts and apply sentiment, producing the
/// persistable record for one (symbol, target date, horizon) key.
///
/// Returns `Ok(None)` when every source abstained — a normal skip, not
/// an error. A non-positive `current_price` is a broken upstream
/// contract and fails loudly here.
pub fn assemble(
    symbol: &str,
    target_date: NaiveDate,
    horizon_days: u32,
    current_price: f64,
    sources: SourceForecasts,
    sentiment: Option<&SentimentSummary>,
    created_at: DateTime<Utc>,
) -> Result<Option<EnsembleForecast>, EngineError> {
    if !current_price.is_finite() || current_price <= 0.0 {
        return Err(EngineError::InvalidInput(format!(
            "current price {current_price} for {symbol} must be finite and positive"
        )));
    }

    let combined = combiner::combine(&sources, current_price);
    let combined_price = match combined.price {
        Some(price) => price,
        None => return Ok(None),
    };

    let adjustment = sentiment::adjust(current_price, combined_price, sentiment)?;
    let (sentiment_applied, sentiment_impact) = match sentiment {
        Some(_) => (Some(adjustment.applied_sentiment), Some(adjustment.impact)),
        None => (None, None),
    };

    Ok(Some(EnsembleForecast {
        symbol: symbol.to_string(),
        target_date,
        horizon_days,
        current_price,
        sources,
        combined_price,
        confidence: combined.confidence,
        sentiment_applied,
        sentiment_impact,
        adjusted_price: adjustment.adjusted_price,
        created_at,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
