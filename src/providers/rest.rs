//! HTTP adapters for remote model and sentiment services.
//!
//! The sequence and autoregressive models run as separate services
//! (training and inference are not this crate's concern); these clients
//! speak their minimal JSON read APIs.
//!
//! Forecast API:  `GET {base}/forecast/{source}/{symbol}?horizon={days}`
//! Sentiment API: `GET {base}/sentiment/{symbol}?as_of={YYYY-MM-DD}`
//! Auth: optional `X-Api-Key` header, key resolved from env by the caller.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{Forecaster, SentimentFeed};
use crate::types::{ForecastSource, SentimentSummary, SentimentTrend};

const USER_AGENT: &str = "FORESIGHT/0.1.0 (ensemble-forecast-engine)";
const REQUEST_TIMEOUT_SECS: u64 = 30;

fn build_http_client() -> Result<Client> {
    Client::builder()
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")
}

// ---------------------------------------------------------------------------
// Forecast service client
// ---------------------------------------------------------------------------

/// Response shape of the model-serving forecast endpoint.
///
/// `predicted_price` is null when the model abstains (e.g. not enough
/// history to run inference for the symbol).
#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    predicted_price: Option<f64>,
}

/// A `Forecaster` backed by a remote model service.
pub struct RestForecaster {
    http: Client,
    base_url: String,
    source: ForecastSource,
    api_key: Option<String>,
}

impl RestForecaster {
    pub fn new(base_url: &str, source: ForecastSource, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            http: build_http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            source,
            api_key,
        })
    }
}

#[async_trait]
impl Forecaster for RestForecaster {
    async fn forecast(&self, symbol: &str, horizon_days: u32) -> Result<Option<f64>> {
        let url = format!(
            "{}/forecast/{}/{}?horizon={horizon_days}",
            self.base_url,
            self.source,
            urlencoding::encode(symbol),
        );
        debug!(url = %url, "Fetching remote forecast");

        let mut request = self.http.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("X-Api-Key", key);
        }

        let resp = request
            .send()
            .await
            .with_context(|| format!("{} forecast request failed", self.source))?;

        // The service answers 404 for symbols it doesn't model — that is
        // an abstention, not a failure.
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("{} forecast API error {status}: {body}", self.source);
        }

        let parsed: ForecastResponse = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse {} forecast response", self.source))?;

        Ok(parsed.predicted_price)
    }

    fn source(&self) -> ForecastSource {
        self.source
    }
}

// ---------------------------------------------------------------------------
// Sentiment service client
// ---------------------------------------------------------------------------

/// Response shape of the news-sentiment endpoint.
#[derive(Debug, Deserialize)]
struct SentimentResponse {
    #[serde(default)]
    average_sentiment: f64,
    #[serde(default)]
    sentiment_strength: f64,
    #[serde(default)]
    trend: Option<String>,
    #[serde(default)]
    news_count: u32,
}

/// A `SentimentFeed` backed by the news pipeline's summary API.
pub struct RestSentimentFeed {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestSentimentFeed {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            http: build_http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl SentimentFeed for RestSentimentFeed {
    async fn get_sentiment(
        &self,
        symbol: &str,
        as_of: NaiveDate,
    ) -> Result<Option<SentimentSummary>> {
        let url = format!(
            "{}/sentiment/{}?as_of={}",
            self.base_url,
            urlencoding::encode(symbol),
            as_of.format("%Y-%m-%d"),
        );
        debug!(url = %url, "Fetching sentiment summary");

        let mut request = self.http.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("X-Api-Key", key);
        }

        let resp = request
            .send()
            .await
            .context("Sentiment request failed")?;

        // No summary for the symbol/date yet
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Sentiment API error {status}: {body}");
        }

        let parsed: SentimentResponse = resp
            .json()
            .await
            .context("Failed to parse sentiment response")?;

        let trend = parsed
            .trend
            .as_deref()
            .and_then(|label| label.parse::<SentimentTrend>().ok())
            .unwrap_or(SentimentTrend::Neutral);

        Ok(Some(SentimentSummary {
            symbol: symbol.to_string(),
            as_of,
            average: parsed.average_sentiment,
            strength: parsed.sentiment_strength,
            trend,
            news_count: parsed.news_count,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
