//! Reporting aggregation.
//!
//! Read-only, non-incremental rollups over persisted accuracy records:
//! an hourly quality trend and a per-symbol leaderboard. Callers fetch
//! the trailing window from storage and hand the records in; nothing
//! here holds state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::types::{AccuracyRecord, AccuracyTier};

// ---------------------------------------------------------------------------
// Hourly trend
// ---------------------------------------------------------------------------

/// Average forecast quality across all symbols evaluated in one hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyTrendPoint {
    /// Start of the hour bucket (UTC).
    pub hour: DateTime<Utc>,
    pub avg_mae: f64,
    pub avg_mape: f64,
    pub avg_r_squared: f64,
    pub avg_confidence: f64,
    /// Distinct symbols evaluated during the hour.
    pub symbol_count: usize,
    /// Total records in the bucket.
    pub record_count: usize,
}

/// Bucket records by evaluation hour and average the quality metrics,
/// oldest bucket first. Hours with no records simply don't appear.
pub fn hourly_trend(records: &[AccuracyRecord]) -> Vec<HourlyTrendPoint> {
    let mut buckets: BTreeMap<DateTime<Utc>, Vec<&AccuracyRecord>> = BTreeMap::new();
    for record in records {
        buckets.entry(record.run_bucket()).or_default().push(record);
    }

    buckets
        .into_iter()
        .map(|(hour, bucket)| {
            let n = bucket.len() as f64;
            let symbols: HashSet<&str> = bucket.iter().map(|r| r.symbol.as_str()).collect();
            HourlyTrendPoint {
                hour,
                avg_mae: bucket.iter().map(|r| r.mae).sum::<f64>() / n,
                avg_mape: bucket.iter().map(|r| r.mape).sum::<f64>() / n,
                avg_r_squared: bucket.iter().map(|r| r.r_squared).sum::<f64>() / n,
                avg_confidence: bucket.iter().map(|r| r.confidence).sum::<f64>() / n,
                symbol_count: symbols.len(),
                record_count: bucket.len(),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Leaderboard
// ---------------------------------------------------------------------------

/// One symbol's standing, taken from its most recent record in the
/// window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub symbol: String,
    pub confidence: f64,
    pub tier: AccuracyTier,
    pub mae: f64,
    pub mape: f64,
    pub r_squared: f64,
    pub evaluated_at: DateTime<Utc>,
}

/// Rank symbols by the confidence of their most recent record,
/// descending, truncated to `top_n`. Ties break alphabetically so the
/// ranking is stable across runs.
pub fn leaderboard(records: &[AccuracyRecord], top_n: usize) -> Vec<LeaderboardEntry> {
    let mut latest: HashMap<&str, &AccuracyRecord> = HashMap::new();
    for record in records {
        latest
            .entry(record.symbol.as_str())
            .and_modify(|current| {
                if record.evaluated_at > current.evaluated_at {
                    *current = record;
                }
            })
            .or_insert(record);
    }

    let mut entries: Vec<LeaderboardEntry> = latest
        .into_values()
        .map(|r| LeaderboardEntry {
            symbol: r.symbol.clone(),
            confidence: r.confidence,
            tier: r.tier(),
            mae: r.mae,
            mape: r.mape,
            r_squared: r.r_squared,
            evaluated_at: r.evaluated_at,
        })
        .collect();

    entries.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    entries.truncate(top_n);
    entries
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
