use std::time::Duration;

use db_pool::parse_env_with_default;
use resilience::RetryConfig;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_STARTUP_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_STARTUP_RETRY_DELAY_SECS: u64 = 2;

/// Process-level settings for the publisher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub port: u16,
    pub startup_max_attempts: u32,
    pub startup_retry_delay: Duration,
    pub json_logs: bool,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            port: parse_env_with_default("PORT", DEFAULT_PORT),
            startup_max_attempts: parse_env_with_default(
                "STARTUP_MAX_ATTEMPTS",
                DEFAULT_STARTUP_MAX_ATTEMPTS,
            )
            .max(1),
            startup_retry_delay: Duration::from_secs(parse_env_with_default(
                "STARTUP_RETRY_DELAY_SECS",
                DEFAULT_STARTUP_RETRY_DELAY_SECS,
            )),
            json_logs: std::env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }

    /// Retry policy for the database and broker connections made at startup
    pub fn startup_retry(&self) -> RetryConfig {
        RetryConfig::fixed(self.startup_max_attempts, self.startup_retry_delay)
    }
}
