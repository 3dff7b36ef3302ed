use std::env;
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Every tunable the core's components read, assembled once at startup.
/// Mirrors the reference deployment's defaults (§6 of the specification).
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub database_url: String,

    pub tick_interval_seconds: u64,
    pub fetch_buffer_seconds: i64,
    pub worker_pool_size: usize,
    pub tick_wall_clock_budget_seconds: u64,

    pub vendor_request_timeout_seconds: u64,
    pub birdeye_credits_per_call: i64,
    pub moralis_credits_per_call: i64,

    pub touch_threshold_seconds: i64,
    pub oversold_k: f64,
    pub oversold_d: f64,
    pub overbought_k: f64,
    pub overbought_d: f64,
    pub max_band_touch_notifications: i32,

    pub db_retry_attempts: u32,
    pub db_retry_backoff_seconds: u64,

    pub credential_reset_interval_hours: u64,
}

impl IngestConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        IngestConfig {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://trading.db".to_string()),

            tick_interval_seconds: env_or("TICK_INTERVAL_SECONDS", 300),
            fetch_buffer_seconds: env_or("FETCH_BUFFER_SECONDS", 300),
            worker_pool_size: env_or("WORKER_POOL_SIZE", 4),
            tick_wall_clock_budget_seconds: env_or("TICK_WALL_CLOCK_BUDGET_SECONDS", 540),

            vendor_request_timeout_seconds: env_or("VENDOR_REQUEST_TIMEOUT_SECONDS", 30),
            birdeye_credits_per_call: env_or("BIRDEYE_CREDITS_PER_CALL", 40),
            moralis_credits_per_call: env_or("MORALIS_CREDITS_PER_CALL", 150),

            touch_threshold_seconds: env_or("TOUCH_THRESHOLD_SECONDS", 7200),
            oversold_k: env_or("OVERSOLD_K", 20.0),
            oversold_d: env_or("OVERSOLD_D", 20.0),
            overbought_k: env_or("OVERBOUGHT_K", 80.0),
            overbought_d: env_or("OVERBOUGHT_D", 80.0),
            max_band_touch_notifications: env_or("MAX_BAND_TOUCH_NOTIFICATIONS", 2),

            db_retry_attempts: env_or("DB_RETRY_ATTEMPTS", 3),
            db_retry_backoff_seconds: env_or("DB_RETRY_BACKOFF_SECONDS", 60),

            credential_reset_interval_hours: env_or("CREDENTIAL_RESET_INTERVAL_HOURS", 12),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }

    pub fn vendor_request_timeout(&self) -> Duration {
        Duration::from_secs(self.vendor_request_timeout_seconds)
    }

    pub fn db_retry_backoff(&self) -> Duration {
        Duration::from_secs(self.db_retry_backoff_seconds)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            database_url: "sqlite::memory:".to_string(),
            tick_interval_seconds: 300,
            fetch_buffer_seconds: 300,
            worker_pool_size: 4,
            tick_wall_clock_budget_seconds: 540,
            vendor_request_timeout_seconds: 30,
            birdeye_credits_per_call: 40,
            moralis_credits_per_call: 150,
            touch_threshold_seconds: 7200,
            oversold_k: 20.0,
            oversold_d: 20.0,
            overbought_k: 80.0,
            overbought_d: 80.0,
            max_band_touch_notifications: 2,
            db_retry_attempts: 3,
            db_retry_backoff_seconds: 60,
            credential_reset_interval_hours: 12,
        }
    }
}
