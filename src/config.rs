//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub universe: UniverseConfig,
    pub storage: StorageConfig,
    pub forecasters: ForecastersConfig,
    pub sentiment: SentimentConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    pub name: String,
    /// Seconds between scheduled passes.
    pub run_interval_secs: u64,
    /// Forecast horizons, in days ahead. Each must be >= 1.
    pub horizons: Vec<u32>,
    /// Trailing window the accuracy pass evaluates, in days.
    pub evaluation_window_days: u32,
    pub max_concurrent_symbols: usize,
    pub storage_retry_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UniverseConfig {
    pub symbols: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub database_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ForecastersConfig {
    pub lstm: RemoteForecasterConfig,
    pub arima: RemoteForecasterConfig,
    pub ma: MovingAverageConfig,
}

/// A forecaster served by a remote model service.
#[derive(Debug, Deserialize, Clone)]
pub struct RemoteForecasterConfig {
    pub enabled: bool,
    pub base_url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

/// The in-process moving-average forecaster.
#[derive(Debug, Deserialize, Clone)]
pub struct MovingAverageConfig {
    pub enabled: bool,
    pub window: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SentimentConfig {
    pub enabled: bool,
    pub base_url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
