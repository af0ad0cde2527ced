//! Ensemble combiner.
//!
//! Merges up to three heterogeneous point-forecasts into a single price
//! estimate with a confidence measure. Sources that abstain (or return
//! garbage — NaN, infinities, non-positive prices) simply lose their
//! weight; the remaining weights renormalise to sum to 1.

use tracing::debug;

use crate::types::{ForecastSource, SourceForecasts};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Cap on the coefficient-of-variation penalty. Disagreement beyond this
/// can't push the discount past 50%.
const DISAGREEMENT_CAP: f64 = 0.5;

/// Relative move vs. the current price beyond which the combined
/// forecast is considered a pathological jump and confidence is halved.
const JUMP_GUARD_THRESHOLD: f64 = 0.20;

// ---------------------------------------------------------------------------
// Combination
// ---------------------------------------------------------------------------

/// Result of combining the available source forecasts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombinedForecast {
    /// Weighted combination, or `None` when no source was usable.
    pub price: Option<f64>,
    /// Confidence in the combination, 0.0–1.0.
    pub confidence: f64,
}

/// Merge the usable source forecasts into one price + confidence.
///
/// Weighting: each present source keeps its base weight
/// (lstm 0.5, arima 0.3, ma 0.2) and the kept weights renormalise to
/// sum to 1. Confidence starts at `present / 3`, is discounted by
/// disagreement between sources, and halved when the combined price
/// jumps more than 20% away from `current_price`.
///
/// Zero usable sources yields `(None, 0.0)` — a normal skip.
/// `current_price` is assumed positive; the caller owns that contract.
pub fn combine(sources: &SourceForecasts, current_price: f64) -> CombinedForecast {
    let present: Vec<(f64, f64)> = ForecastSource::ALL
        .iter()
        .filter_map(|source| {
            sources
                .get(*source)
                .filter(|p| p.is_finite() && *p > 0.0)
                .map(|p| (source.base_weight(), p))
        })
        .collect();

    if present.is_empty() {
        return CombinedForecast {
            price: None,
            confidence: 0.0,
        };
    }

    let total_weight: f64 = present.iter().map(|(w, _)| w).sum();
    let combined: f64 = present.iter().map(|(w, p)| w / total_weight * p).sum();

    let mut confidence = present.len() as f64 / ForecastSource::ALL.len() as f64;

    if present.len() >= 2 {
        let prices: Vec<f64> = present.iter().map(|(_, p)| *p).collect();
        let cv = coefficient_of_variation(&prices);
        confidence *= 1.0 - cv.min(DISAGREEMENT_CAP);
    }

    let jump = (combined - current_price).abs() / current_price;
    if jump > JUMP_GUARD_THRESHOLD {
        debug!(
            combined = format!("{combined:.2}"),
            current = format!("{current_price:.2}"),
            jump_pct = format!("{:.1}%", jump * 100.0),
            "Combined forecast jumped past guard threshold, halving confidence"
        );
        confidence /= 2.0;
    }

    CombinedForecast {
        price: Some(combined),
        confidence: confidence.clamp(0.0, 1.0),
    }
}

/// Sample standard deviation divided by the mean — a scale-free measure
/// of disagreement between the present forecasts.
fn coefficient_of_variation(prices: &[f64]) -> f64 {
    let n = prices.len() as f64;
    let mean = prices.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt() / mean
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
