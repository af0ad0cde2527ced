//! Shared types for the FORESIGHT engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that provider, ensemble,
//! accuracy, and engine modules can depend on them without
//! circular references.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Price history
// ---------------------------------------------------------------------------

/// A single daily closing price for a symbol.
///
/// Append-only per symbol and immutable once recorded; the engine only
/// ever reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub symbol: String,
    pub trade_date: NaiveDate,
    /// Closing price. Always positive in well-formed history.
    pub close: f64,
}

impl fmt::Display for PricePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} close={:.2}", self.symbol, self.trade_date, self.close)
    }
}

// ---------------------------------------------------------------------------
// Forecast sources
// ---------------------------------------------------------------------------

/// The fixed set of forecasting techniques that feed the ensemble.
///
/// A closed enum rather than a source→price map, so that weight
/// renormalisation is exhaustive and the compiler checks every match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForecastSource {
    /// Sequence model (LSTM or similar).
    Lstm,
    /// Autoregressive model (ARIMA or similar).
    Arima,
    /// Moving-average trend model.
    Ma,
}

impl ForecastSource {
    /// All sources in weight order (useful for iteration).
    pub const ALL: &'static [ForecastSource] = &[
        ForecastSource::Lstm,
        ForecastSource::Arima,
        ForecastSource::Ma,
    ];

    /// Base ensemble weight before renormalisation over present sources.
    pub fn base_weight(&self) -> f64 {
        match self {
            ForecastSource::Lstm => 0.5,
            ForecastSource::Arima => 0.3,
            ForecastSource::Ma => 0.2,
        }
    }
}

impl fmt::Display for ForecastSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForecastSource::Lstm => write!(f, "lstm"),
            ForecastSource::Arima => write!(f, "arima"),
            ForecastSource::Ma => write!(f, "ma"),
        }
    }
}

impl std::str::FromStr for ForecastSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lstm" => Ok(ForecastSource::Lstm),
            "arima" => Ok(ForecastSource::Arima),
            "ma" | "moving_average" | "moving-average" => Ok(ForecastSource::Ma),
            _ => Err(anyhow::anyhow!("Unknown forecast source: {s}")),
        }
    }
}

/// Raw per-source point forecasts for one (symbol, target date, horizon).
///
/// Transient — never persisted on its own. `None` means the source
/// abstained (or its adapter failed and was treated as abstaining).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceForecasts {
    pub lstm: Option<f64>,
    pub arima: Option<f64>,
    pub ma: Option<f64>,
}

impl SourceForecasts {
    /// The raw prediction for a given source.
    pub fn get(&self, source: ForecastSource) -> Option<f64> {
        match source {
            ForecastSource::Lstm => self.lstm,
            ForecastSource::Arima => self.arima,
            ForecastSource::Ma => self.ma,
        }
    }

    /// Set the prediction for a given source.
    pub fn set(&mut self, source: ForecastSource, price: Option<f64>) {
        match source {
            ForecastSource::Lstm => self.lstm = price,
            ForecastSource::Arima => self.arima = price,
            ForecastSource::Ma => self.ma = price,
        }
    }

    /// Whether every source abstained.
    pub fn is_empty(&self) -> bool {
        self.lstm.is_none() && self.arima.is_none() && self.ma.is_none()
    }
}

impl fmt::Display for SourceForecasts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        for source in ForecastSource::ALL {
            if let Some(p) = self.get(*source) {
                parts.push(format!("{source}={p:.2}"));
            }
        }
        if parts.is_empty() {
            write!(f, "no forecasts")
        } else {
            write!(f, "{}", parts.join(" | "))
        }
    }
}

// ---------------------------------------------------------------------------
// Ensemble forecast
// ---------------------------------------------------------------------------

/// The persisted output of one forecast pass for one (symbol, target
/// date, horizon) key.
///
/// `combined_price` is only defined when at least one source produced a
/// usable output — a fully-abstained key is skipped upstream and never
/// reaches storage, so the field is not optional here. Re-running a pass
/// overwrites the record in place (last write wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleForecast {
    pub symbol: String,
    pub target_date: NaiveDate,
    /// Days ahead this forecast targets. Always >= 1.
    pub horizon_days: u32,
    /// Last known close at the time the forecast was made.
    pub current_price: f64,
    /// Raw per-source predictions that fed the combination.
    pub sources: SourceForecasts,
    /// Weighted combination of the present sources.
    pub combined_price: f64,
    /// Ensemble confidence (0.0–1.0).
    pub confidence: f64,
    /// Average sentiment that was applied, if any.
    pub sentiment_applied: Option<f64>,
    /// Magnitude of the sentiment impact (strength × volume factor), if any.
    pub sentiment_impact: Option<f64>,
    /// Final prediction after sentiment adjustment. Equals
    /// `combined_price` when no sentiment was applied.
    pub adjusted_price: f64,
    pub created_at: DateTime<Utc>,
}

impl EnsembleForecast {
    /// Expected move from the current price to the adjusted prediction,
    /// as a signed percentage.
    pub fn expected_move_pct(&self) -> f64 {
        if self.current_price == 0.0 {
            0.0
        } else {
            (self.adjusted_price - self.current_price) / self.current_price * 100.0
        }
    }

    /// Whether a sentiment correction moved the prediction.
    pub fn was_sentiment_adjusted(&self) -> bool {
        self.sentiment_impact.unwrap_or(0.0) != 0.0
    }
}

impl fmt::Display for EnsembleForecast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}d→{} | now={:.2} combined={:.2} adjusted={:.2} ({:+.2}%) | conf={:.0}%",
            self.symbol,
            self.horizon_days,
            self.target_date,
            self.current_price,
            self.combined_price,
            self.adjusted_price,
            self.expected_move_pct(),
            self.confidence * 100.0,
        )
    }
}

// ---------------------------------------------------------------------------
// Sentiment
// ---------------------------------------------------------------------------

/// Direction label attached to a sentiment summary by the news pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentTrend {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for SentimentTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentimentTrend::Bullish => write!(f, "bullish"),
            SentimentTrend::Bearish => write!(f, "bearish"),
            SentimentTrend::Neutral => write!(f, "neutral"),
        }
    }
}

impl std::str::FromStr for SentimentTrend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bullish" | "positive" => Ok(SentimentTrend::Bullish),
            "bearish" | "negative" => Ok(SentimentTrend::Bearish),
            "neutral" | "mixed" => Ok(SentimentTrend::Neutral),
            _ => Err(anyhow::anyhow!("Unknown sentiment trend: {s}")),
        }
    }
}

/// Aggregated news sentiment for a symbol on a given day.
///
/// Produced by an external news pipeline; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub symbol: String,
    pub as_of: NaiveDate,
    /// Average article sentiment, -1.0 (bearish) to 1.0 (bullish).
    pub average: f64,
    /// Signal strength, 0.0 to 1.0.
    pub strength: f64,
    pub trend: SentimentTrend,
    /// Number of news items behind the summary.
    pub news_count: u32,
}

impl SentimentSummary {
    /// Check the field ranges the sentiment contract promises.
    ///
    /// Out-of-range values are a contract violation by the upstream
    /// pipeline and must fail loudly rather than be clamped.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.average.is_finite() || !(-1.0..=1.0).contains(&self.average) {
            return Err(EngineError::InvalidInput(format!(
                "sentiment average {} out of [-1, 1] for {}",
                self.average, self.symbol
            )));
        }
        if !self.strength.is_finite() || !(0.0..=1.0).contains(&self.strength) {
            return Err(EngineError::InvalidInput(format!(
                "sentiment strength {} out of [0, 1] for {}",
                self.strength, self.symbol
            )));
        }
        Ok(())
    }
}

impl fmt::Display for SentimentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} avg={:+.2} strength={:.2} ({}, n={})",
            self.symbol, self.as_of, self.average, self.strength, self.trend, self.news_count,
        )
    }
}

// ---------------------------------------------------------------------------
// Accuracy
// ---------------------------------------------------------------------------

/// Quality classification derived from an accuracy record's metrics.
///
/// Checked top-down; the first matching rung wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccuracyTier {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl AccuracyTier {
    /// Classify a (MAE, MAPE, R²) triple.
    pub fn from_metrics(mae: f64, mape: f64, r_squared: f64) -> Self {
        if mae <= 2.0 && mape <= 2.0 && r_squared >= 0.9 {
            AccuracyTier::Excellent
        } else if mae <= 5.0 && mape <= 5.0 && r_squared >= 0.7 {
            AccuracyTier::Good
        } else if mae <= 10.0 && mape <= 10.0 && r_squared >= 0.5 {
            AccuracyTier::Acceptable
        } else {
            AccuracyTier::Poor
        }
    }
}

impl fmt::Display for AccuracyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccuracyTier::Excellent => write!(f, "excellent"),
            AccuracyTier::Good => write!(f, "good"),
            AccuracyTier::Acceptable => write!(f, "acceptable"),
            AccuracyTier::Poor => write!(f, "poor"),
        }
    }
}

/// Retrospective forecast-quality metrics for one symbol and one
/// evaluation run.
///
/// One record per (symbol, run bucket); re-evaluating within the same
/// bucket overwrites in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyRecord {
    pub symbol: String,
    pub evaluated_at: DateTime<Utc>,
    /// Mean absolute error, in price units.
    pub mae: f64,
    /// Root mean squared error, in price units.
    pub rmse: f64,
    /// Mean absolute percentage error (0–100+).
    pub mape: f64,
    /// Fraction of variance in actuals explained by predictions.
    pub r_squared: f64,
    /// Percentage of pairs where the predicted direction matched.
    pub directional_accuracy: f64,
    /// Number of matched (predicted, actual) pairs evaluated.
    pub sample_size: u32,
    /// Composite confidence score, 0–100.
    pub confidence: f64,
}

impl AccuracyRecord {
    /// The upsert bucket for this record: its evaluation hour (UTC).
    pub fn run_bucket(&self) -> DateTime<Utc> {
        self.evaluated_at
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(self.evaluated_at)
    }

    /// Quality tier derived from the stored metrics (never persisted).
    pub fn tier(&self) -> AccuracyTier {
        AccuracyTier::from_metrics(self.mae, self.mape, self.r_squared)
    }
}

impl fmt::Display for AccuracyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] MAE={:.2} RMSE={:.2} MAPE={:.2}% R²={:.3} dir={:.0}% conf={:.0} (n={})",
            self.symbol,
            self.tier(),
            self.mae,
            self.rmse,
            self.mape,
            self.r_squared,
            self.directional_accuracy,
            self.confidence,
            self.sample_size,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for FORESIGHT.
///
/// "Not enough data" is deliberately absent: thin history, abstaining
/// forecasters, and short evaluation windows are normal skips expressed
/// as `None`/`Option`, not errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A caller broke a function's input contract (non-positive price,
    /// out-of-range sentiment, non-finite number). Never silently coerced.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
