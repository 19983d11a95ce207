use std::time::Duration;

use db_pool::parse_env_with_default;
use resilience::RetryConfig;

const DEFAULT_STARTUP_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_STARTUP_RETRY_DELAY_SECS: u64 = 2;
const DEFAULT_INSERT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_INSERT_RETRY_DELAY_MS: u64 = 500;
const DEFAULT_INSERT_TIMEOUT_SECS: u64 = 5;

/// Process-level settings for the subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    pub startup_max_attempts: u32,
    pub startup_retry_delay: Duration,
    pub insert_max_attempts: u32,
    pub insert_retry_delay: Duration,
    pub insert_timeout: Duration,
    pub json_logs: bool,
}

impl ConsumerConfig {
    pub fn from_env() -> Self {
        Self {
            startup_max_attempts: parse_env_with_default(
                "STARTUP_MAX_ATTEMPTS",
                DEFAULT_STARTUP_MAX_ATTEMPTS,
            )
            .max(1),
            startup_retry_delay: Duration::from_secs(parse_env_with_default(
                "STARTUP_RETRY_DELAY_SECS",
                DEFAULT_STARTUP_RETRY_DELAY_SECS,
            )),
            insert_max_attempts: parse_env_with_default(
                "INSERT_MAX_ATTEMPTS",
                DEFAULT_INSERT_MAX_ATTEMPTS,
            )
            .max(1),
            insert_retry_delay: Duration::from_millis(parse_env_with_default(
                "INSERT_RETRY_DELAY_MS",
                DEFAULT_INSERT_RETRY_DELAY_MS,
            )),
            insert_timeout: Duration::from_secs(parse_env_with_default(
                "INSERT_TIMEOUT_SECS",
                DEFAULT_INSERT_TIMEOUT_SECS,
            )),
            json_logs: std::env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }

    pub fn startup_retry(&self) -> RetryConfig {
        RetryConfig::fixed(self.startup_max_attempts, self.startup_retry_delay)
    }

    /// In-place retry for a single event insert
    pub fn insert_retry(&self) -> RetryConfig {
        RetryConfig::fixed(self.insert_max_attempts, self.insert_retry_delay)
    }
}
