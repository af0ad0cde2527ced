//! Accuracy evaluator.
//!
//! Matches persisted forecasts against realized closing prices and
//! scores forecast quality: MAE, RMSE, MAPE, R², directional accuracy,
//! and a composite confidence feeding the tier classification.

pub mod metrics;

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::types::{AccuracyRecord, EnsembleForecast, PricePoint};

/// Minimum matched pairs required before an evaluation is meaningful.
const MIN_MATCHED_PAIRS: usize = 2;

// ---------------------------------------------------------------------------
// Pair matching
// ---------------------------------------------------------------------------

/// A forecast joined with the close that was eventually realized on its
/// target date.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPair {
    pub target_date: NaiveDate,
    /// The sentiment-adjusted prediction — the engine's final output.
    pub predicted: f64,
    /// The realized close on the target date.
    pub actual: f64,
}

/// Join forecasts with price history on the target date.
///
/// Forecasts whose target date has no recorded close yet are dropped
/// (they simply aren't evaluable). Output is ordered by target date,
/// then horizon, so directional comparisons are stable.
pub fn match_pairs(forecasts: &[EnsembleForecast], prices: &[PricePoint]) -> Vec<MatchedPair> {
    let closes: HashMap<NaiveDate, f64> =
        prices.iter().map(|p| (p.trade_date, p.close)).collect();

    let mut indexed: Vec<(&EnsembleForecast, f64)> = forecasts
        .iter()
        .filter_map(|fc| closes.get(&fc.target_date).map(|close| (fc, *close)))
        .collect();
    indexed.sort_by_key(|(fc, _)| (fc.target_date, fc.horizon_days));

    indexed
        .into_iter()
        .map(|(fc, actual)| MatchedPair {
            target_date: fc.target_date,
            predicted: fc.adjusted_price,
            actual,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Score the matched pairs for one symbol.
///
/// Returns `None` when there is not enough matched history — the normal
/// "come back later" case, not an error.
pub fn evaluate_pairs(
    symbol: &str,
    pairs: &[MatchedPair],
    evaluated_at: DateTime<Utc>,
) -> Option<AccuracyRecord> {
    if pairs.len() < MIN_MATCHED_PAIRS {
        debug!(
            symbol,
            matched = pairs.len(),
            "Not enough matched pairs to evaluate"
        );
        return None;
    }

    let tuples: Vec<(f64, f64)> = pairs.iter().map(|p| (p.predicted, p.actual)).collect();

    let mae = metrics::mean_absolute_error(&tuples);
    let rmse = metrics::root_mean_squared_error(&tuples);
    let mape = metrics::mean_absolute_percentage_error(&tuples);
    let r_squared = metrics::r_squared(&tuples);
    let directional = metrics::directional_accuracy(&tuples);
    let confidence = metrics::confidence_score(mae, mape, r_squared);

    Some(AccuracyRecord {
        symbol: symbol.to_string(),
        evaluated_at,
        mae,
        rmse,
        mape,
        r_squared,
        directional_accuracy: directional,
        sample_size: pairs.len() as u32,
        confidence,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
