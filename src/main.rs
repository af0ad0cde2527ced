//! FORESIGHT — Ensemble Price Forecast & Accuracy Evaluation Engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens the store, wires the forecaster adapters, and runs the
//! forecast/accuracy passes on an interval with graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use foresight::config::{self, AppConfig};
use foresight::dashboard;
use foresight::dashboard::routes::DashboardState;
use foresight::engine::{EngineOptions, EnsembleEngine};
use foresight::providers::rest::{RestForecaster, RestSentimentFeed};
use foresight::providers::sma::SmaForecaster;
use foresight::providers::{ForecasterSet, PriceHistory, SentimentFeed};
use foresight::storage::sqlite::SqliteStore;
use foresight::storage::ForecastStore;
use foresight::types::ForecastSource;

const BANNER: &str = r#"
 _____ ___  ____  _____ ____ ___ ____ _   _ _____
|  ___/ _ \|  _ \| ____/ ___|_ _/ ___| | | |_   _|
| |_ | | | | |_) |  _| \___ \| | |  _| |_| | | |
|  _|| |_| |  _ <| |___ ___) | | |_| |  _  | | |
|_|   \___/|_| \_\_____|____/___\____|_| |_| |_|

  Ensemble Forecast & Accuracy Evaluation Engine
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = config::AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        engine_name = %cfg.engine.name,
        run_interval_secs = cfg.engine.run_interval_secs,
        symbols = cfg.universe.symbols.len(),
        horizons = ?cfg.engine.horizons,
        "FORESIGHT starting up"
    );

    // -- Storage -----------------------------------------------------------

    let store = Arc::new(SqliteStore::connect(&cfg.storage.database_url).await?);
    let prices: Arc<dyn PriceHistory> = store.clone();

    // -- Forecaster adapters ----------------------------------------------

    let forecasters = build_forecasters(&cfg, prices.clone())?;
    if forecasters.is_empty() {
        warn!("No forecasters enabled — forecast passes will skip every symbol");
    }

    let sentiment: Option<Arc<dyn SentimentFeed>> = if cfg.sentiment.enabled {
        let api_key = resolve_optional_key(cfg.sentiment.api_key_env.as_deref());
        Some(Arc::new(RestSentimentFeed::new(
            &cfg.sentiment.base_url,
            api_key,
        )?))
    } else {
        None
    };

    // -- Engine ------------------------------------------------------------

    let engine = EnsembleEngine::new(
        prices,
        forecasters,
        sentiment,
        store.clone() as Arc<dyn ForecastStore>,
        EngineOptions {
            max_concurrent_symbols: cfg.engine.max_concurrent_symbols,
            storage_retry_attempts: cfg.engine.storage_retry_attempts,
            ..EngineOptions::default()
        },
    );

    // -- Dashboard ---------------------------------------------------------

    if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(store.clone() as Arc<dyn ForecastStore>));
        dashboard::spawn_dashboard(state, cfg.dashboard.port)?;
    }

    // -- Main loop ---------------------------------------------------------

    let run_interval = Duration::from_secs(cfg.engine.run_interval_secs);
    let mut interval = tokio::time::interval(run_interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.engine.run_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let forecast_summary = engine
                    .run_forecast_pass(&cfg.universe.symbols, &cfg.engine.horizons)
                    .await;
                let accuracy_summary = engine
                    .run_accuracy_pass(&cfg.universe.symbols, cfg.engine.evaluation_window_days)
                    .await;

                info!(
                    forecast = %forecast_summary,
                    accuracy = %accuracy_summary,
                    "Run complete"
                );
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!("FORESIGHT shut down cleanly.");
    Ok(())
}

/// Wire the configured forecaster adapters into their ensemble slots.
fn build_forecasters(cfg: &AppConfig, prices: Arc<dyn PriceHistory>) -> Result<ForecasterSet> {
    let mut set = ForecasterSet::default();

    if cfg.forecasters.lstm.enabled {
        let api_key = resolve_optional_key(cfg.forecasters.lstm.api_key_env.as_deref());
        set = set.with(
            ForecastSource::Lstm,
            Arc::new(RestForecaster::new(
                &cfg.forecasters.lstm.base_url,
                ForecastSource::Lstm,
                api_key,
            )?),
        );
    }

    if cfg.forecasters.arima.enabled {
        let api_key = resolve_optional_key(cfg.forecasters.arima.api_key_env.as_deref());
        set = set.with(
            ForecastSource::Arima,
            Arc::new(RestForecaster::new(
                &cfg.forecasters.arima.base_url,
                ForecastSource::Arima,
                api_key,
            )?),
        );
    }

    if cfg.forecasters.ma.enabled {
        set = set.with(
            ForecastSource::Ma,
            Arc::new(SmaForecaster::new(prices, cfg.forecasters.ma.window)),
        );
    }

    Ok(set)
}

/// Resolve an optional env-var-named secret; absence is non-fatal.
fn resolve_optional_key(env_name: Option<&str>) -> Option<String> {
    env_name.and_then(|env| std::env::var(env).ok())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("foresight=info"));

    let json_logging = std::env::var("FORESIGHT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
