use crate::types::KlineInterval;
use std::env;

/// Lifecycle policy knobs shared by the lifecycle manager and resolver.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// How long a PENDING signal may wait for confirmation before it is
    /// invalidated (hours).
    pub confirm_deadline_hours: f64,
    /// Maximum holding duration for a TRACKING signal before forced
    /// closure (hours).
    pub max_holding_hours: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            confirm_deadline_hours: 24.0,
            max_holding_hours: 72.0,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// SQLite database path.
    pub database_path: String,
    /// Binance futures REST base URL (overridable for mirrors/tests).
    pub binance_futures_url: String,
    /// Price-source request timeout (seconds).
    pub source_timeout_secs: u64,
    /// Tracking tick interval (seconds).
    pub tick_interval_secs: u64,
    /// Kline sampling interval.
    pub kline_interval: KlineInterval,
    /// Statistics aggregation interval (seconds).
    pub aggregation_interval_secs: u64,
    /// Maximum concurrent per-signal ticks within one pass.
    pub tick_concurrency: usize,
    /// Grace period for in-flight work on shutdown (seconds).
    pub shutdown_grace_secs: u64,
    /// Lifecycle policy.
    pub lifecycle: LifecycleConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let host = env::var("VIGIL_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = env::var("VIGIL_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3002);

        Self {
            host,
            port,
            database_path: env::var("VIGIL_DATABASE_PATH")
                .unwrap_or_else(|_| "vigil.db".to_string()),
            binance_futures_url: env::var("VIGIL_BINANCE_FUTURES_URL")
                .unwrap_or_else(|_| "https://fapi.binance.com".to_string()),
            source_timeout_secs: env::var("VIGIL_SOURCE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            tick_interval_secs: env::var("VIGIL_TICK_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            kline_interval: env::var("VIGIL_KLINE_INTERVAL")
                .ok()
                .and_then(|v| KlineInterval::from_str(&v))
                .unwrap_or(KlineInterval::OneHour),
            aggregation_interval_secs: env::var("VIGIL_AGGREGATION_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            tick_concurrency: env::var("VIGIL_TICK_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8),
            shutdown_grace_secs: env::var("VIGIL_SHUTDOWN_GRACE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            lifecycle: LifecycleConfig {
                confirm_deadline_hours: env::var("VIGIL_CONFIRM_DEADLINE_HOURS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(24.0),
                max_holding_hours: env::var("VIGIL_MAX_HOLDING_HOURS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(72.0),
            },
        }
    }
}
