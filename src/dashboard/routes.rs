//! Dashboard API route handlers.
//!
//! All endpoints are read-only JSON views over persisted accuracy
//! records; nothing here can mutate engine state.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use crate::report::{self, HourlyTrendPoint, LeaderboardEntry};
use crate::storage::ForecastStore;

/// Trailing window both views aggregate over.
const TREND_WINDOW_HOURS: i64 = 24;

/// Leaderboard length when the caller doesn't ask for one.
const DEFAULT_TOP_N: usize = 10;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub store: Arc<dyn ForecastStore>,
}

impl DashboardState {
    pub fn new(store: Arc<dyn ForecastStore>) -> Self {
        Self { store }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/accuracy/trend
///
/// Hourly quality averages over the trailing 24 hours.
pub async fn get_trend(
    State(state): State<AppState>,
) -> Result<Json<Vec<HourlyTrendPoint>>, StatusCode> {
    let since = Utc::now() - Duration::hours(TREND_WINDOW_HOURS);
    let records = state.store.recent_accuracy(since).await.map_err(|e| {
        error!(error = %e, "Trend query failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(report::hourly_trend(&records)))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    pub top: Option<usize>,
}

/// GET /api/accuracy/leaderboard?top=N
///
/// Top symbols by confidence over the trailing 24 hours.
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<Vec<LeaderboardEntry>>, StatusCode> {
    let since = Utc::now() - Duration::hours(TREND_WINDOW_HOURS);
    let records = state.store.recent_accuracy(since).await.map_err(|e| {
        error!(error = %e, "Leaderboard query failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let top_n = params.top.unwrap_or(DEFAULT_TOP_N);
    Ok(Json(report::leaderboard(&records, top_n)))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}
