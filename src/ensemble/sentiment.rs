//! Sentiment adjuster.
//!
//! Nudges the combined prediction using an external news-sentiment
//! summary. The correction is bounded three ways: news volume saturates,
//! the theoretical move is capped at ±10%, and the final price is
//! clamped to a ±30% band around the current price. Absence of news is
//! never turned into a signal — it passes the prediction through.

use tracing::debug;

use crate::types::{EngineError, SentimentSummary};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// News-item count at which the volume factor saturates.
const VOLUME_SATURATION_COUNT: f64 = 20.0;

/// Ceiling on the volume factor.
const VOLUME_FACTOR_CAP: f64 = 0.5;

/// Scale from (sentiment × impact) to a price ratio; caps the
/// theoretical move at ±10%.
const MAX_ADJUSTMENT_RATIO: f64 = 0.10;

/// Hard clamp band on the adjusted price, relative to the current price.
const LOWER_BAND: f64 = 0.7;
const UPPER_BAND: f64 = 1.3;

// ---------------------------------------------------------------------------
// Adjustment
// ---------------------------------------------------------------------------

/// Outcome of applying (or passing through) a sentiment correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentAdjustment {
    /// Final prediction after the correction and band clamp.
    pub adjusted_price: f64,
    /// The average sentiment that was applied (0.0 on pass-through).
    pub applied_sentiment: f64,
    /// Impact magnitude: strength × volume factor (0.0 on pass-through).
    pub impact: f64,
}

/// Apply a bounded sentiment correction to `base_prediction`.
///
/// Pure function. `None` or a zero news count passes the prediction
/// through unchanged. Out-of-range sentiment fields and non-finite
/// prices are contract violations and fail loudly — they are never
/// silently clamped.
pub fn adjust(
    current_price: f64,
    base_prediction: f64,
    sentiment: Option<&SentimentSummary>,
) -> Result<SentimentAdjustment, EngineError> {
    if !current_price.is_finite() || current_price <= 0.0 {
        return Err(EngineError::InvalidInput(format!(
            "current price {current_price} must be finite and positive"
        )));
    }
    if !base_prediction.is_finite() {
        return Err(EngineError::InvalidInput(format!(
            "base prediction {base_prediction} must be finite"
        )));
    }

    let summary = match sentiment {
        Some(s) => s,
        None => return Ok(SentimentAdjustment::pass_through(base_prediction)),
    };
    summary.validate()?;

    if summary.news_count == 0 {
        return Ok(SentimentAdjustment::pass_through(base_prediction));
    }

    let volume_factor = (summary.news_count as f64 / VOLUME_SATURATION_COUNT).min(VOLUME_FACTOR_CAP);
    let impact = summary.strength * volume_factor;
    let adjustment_ratio = summary.average * impact * MAX_ADJUSTMENT_RATIO;

    let raw = base_prediction * (1.0 + adjustment_ratio);
    let adjusted_price = raw.clamp(current_price * LOWER_BAND, current_price * UPPER_BAND);

    if adjusted_price != raw {
        debug!(
            symbol = %summary.symbol,
            raw = format!("{raw:.2}"),
            clamped = format!("{adjusted_price:.2}"),
            "Sentiment-adjusted price clamped to band"
        );
    }

    Ok(SentimentAdjustment {
        adjusted_price,
        applied_sentiment: summary.average,
        impact,
    })
}

impl SentimentAdjustment {
    fn pass_through(base_prediction: f64) -> Self {
        Self {
            adjusted_price: base_prediction,
            applied_sentiment: 0.0,
            impact: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SentimentTrend;
    use chrono::NaiveDate;

    fn summary(average: f64, strength: f64, news_count: u32) -> SentimentSummary {
        SentimentSummary {
            symbol: "ACME".to_string(),
            as_of: NaiveDate::from_ymd_opt(2026, 3, 3).unwrap(),
            average,
            strength,
            trend: SentimentTrend::Neutral,
            news_count,
        }
    }

    // -- Pass-through cases --

    #[test]
    fn test_no_sentiment_passes_through() {
        let r = adjust(1000.0, 1002.0, None).unwrap();
        assert_eq!(r.adjusted_price, 1002.0);
        assert_eq!(r.applied_sentiment, 0.0);
        assert_eq!(r.impact, 0.0);
    }

    #[test]
    fn test_zero_news_is_identity_for_any_signal() {
        for (avg, strength) in [(1.0, 1.0), (-1.0, 1.0), (0.5, 0.2), (0.0, 0.0)] {
            let r = adjust(1000.0, 1002.0, Some(&summary(avg, strength, 0))).unwrap();
            assert_eq!(r.adjusted_price, 1002.0, "avg={avg} strength={strength}");
            assert_eq!(r.impact, 0.0);
        }
    }

    // -- Worked example --

    #[test]
    fn test_worked_example() {
        // avg=0.5, strength=0.8, n=10 → volume=0.5, impact=0.4,
        // ratio=0.02, 1002 × 1.02 = 1022.04 (inside the band)
        let r = adjust(1000.0, 1002.0, Some(&summary(0.5, 0.8, 10))).unwrap();
        assert!((r.adjusted_price - 1022.04).abs() < 1e-9);
        assert!((r.applied_sentiment - 0.5).abs() < 1e-12);
        assert!((r.impact - 0.4).abs() < 1e-12);
    }

    // -- Volume saturation --

    #[test]
    fn test_volume_factor_saturates() {
        // 10 items already reach the 0.5 cap; more news adds nothing
        let at_cap = adjust(1000.0, 1002.0, Some(&summary(0.5, 0.8, 10))).unwrap();
        let beyond = adjust(1000.0, 1002.0, Some(&summary(0.5, 0.8, 500))).unwrap();
        assert_eq!(at_cap.adjusted_price, beyond.adjusted_price);
        assert_eq!(at_cap.impact, beyond.impact);
    }

    #[test]
    fn test_low_volume_scales_linearly() {
        // 4 items → volume factor 0.2, impact 0.8 × 0.2 = 0.16
        let r = adjust(1000.0, 1000.0, Some(&summary(1.0, 0.8, 4))).unwrap();
        assert!((r.impact - 0.16).abs() < 1e-12);
        assert!((r.adjusted_price - 1016.0).abs() < 1e-9);
    }

    // -- Band clamp --

    #[test]
    fn test_output_always_within_band() {
        // Base prediction already outside the band gets pulled back in
        let r = adjust(100.0, 200.0, Some(&summary(1.0, 1.0, 100))).unwrap();
        assert!((r.adjusted_price - 130.0).abs() < 1e-9);

        let r = adjust(100.0, 50.0, Some(&summary(-1.0, 1.0, 100))).unwrap();
        assert!((r.adjusted_price - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_band_property_over_grid() {
        let current = 100.0;
        for avg in [-1.0, -0.5, 0.0, 0.5, 1.0] {
            for strength in [0.0, 0.3, 1.0] {
                for n in [1, 5, 20, 1000] {
                    for base in [75.0, 100.0, 128.0] {
                        let r = adjust(current, base, Some(&summary(avg, strength, n))).unwrap();
                        assert!(
                            r.adjusted_price >= 70.0 - 1e-9 && r.adjusted_price <= 130.0 + 1e-9,
                            "out of band: avg={avg} strength={strength} n={n} base={base} → {}",
                            r.adjusted_price
                        );
                    }
                }
            }
        }
    }

    // -- Direction --

    #[test]
    fn test_negative_sentiment_lowers_price() {
        let r = adjust(1000.0, 1002.0, Some(&summary(-0.5, 0.8, 10))).unwrap();
        assert!(r.adjusted_price < 1002.0);
        assert!((r.adjusted_price - 981.96).abs() < 1e-9);
    }

    // -- Contract violations --

    #[test]
    fn test_out_of_range_sentiment_rejected() {
        assert!(adjust(1000.0, 1002.0, Some(&summary(1.5, 0.8, 10))).is_err());
        assert!(adjust(1000.0, 1002.0, Some(&summary(0.5, 1.2, 10))).is_err());
        assert!(adjust(1000.0, 1002.0, Some(&summary(f64::NAN, 0.8, 10))).is_err());
    }

    #[test]
    fn test_bad_prices_rejected() {
        assert!(adjust(0.0, 1002.0, None).is_err());
        assert!(adjust(-10.0, 1002.0, None).is_err());
        assert!(adjust(f64::NAN, 1002.0, None).is_err());
        assert!(adjust(1000.0, f64::INFINITY, None).is_err());
    }

    // -- Determinism --

    #[test]
    fn test_adjust_deterministic() {
        let s = summary(0.31, 0.67, 13);
        let a = adjust(987.6, 1001.2, Some(&s)).unwrap();
        let b = adjust(987.6, 1001.2, Some(&s)).unwrap();
        assert_eq!(a, b);
    }
}
