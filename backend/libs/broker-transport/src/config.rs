//! Broker connection settings loaded from the environment

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use tracing::info;

use crate::error::TransportAuthError;

pub const DEFAULT_BROKER: &str = "localhost:9093";
pub const DEFAULT_CONSUMER_GROUP: &str = "portfolio-analytics-consumer";
const DEFAULT_DELIVERY_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// Kafka transport configuration.
///
/// Credentials are kept optional here so a missing `KAFKA_USER` or
/// `KAFKA_PASSWORD` surfaces as [`TransportAuthError::MissingCredentials`]
/// at connect time, before any socket is opened.
pub struct BrokerConfig {
    pub bootstrap: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub topic: String,
    pub ca_location: Option<PathBuf>,
    pub client_id: String,
    pub consumer_group: String,
    pub delivery_timeout: Duration,
    pub handshake_timeout: Duration,
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("bootstrap", &self.bootstrap)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("topic", &self.topic)
            .field("ca_location", &self.ca_location)
            .field("client_id", &self.client_id)
            .field("consumer_group", &self.consumer_group)
            .field("delivery_timeout", &self.delivery_timeout)
            .finish()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl BrokerConfig {
    pub fn from_env(client_id: &str) -> Self {
        let delivery_timeout_ms = non_empty_env("KAFKA_DELIVERY_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_DELIVERY_TIMEOUT_MS);

        Self {
            bootstrap: non_empty_env("KAFKA_BROKER").unwrap_or_else(|| DEFAULT_BROKER.to_string()),
            username: non_empty_env("KAFKA_USER"),
            // Passwords are not trimmed
            password: std::env::var("KAFKA_PASSWORD")
                .ok()
                .filter(|v| !v.is_empty())
                .map(SecretString::from),
            topic: non_empty_env("KAFKA_TOPIC")
                .unwrap_or_else(|| event_schema::DEFAULT_TOPIC.to_string()),
            ca_location: non_empty_env("KAFKA_SSL_CA_LOCATION").map(PathBuf::from),
            client_id: client_id.to_string(),
            consumer_group: non_empty_env("KAFKA_CONSUMER_GROUP")
                .unwrap_or_else(|| DEFAULT_CONSUMER_GROUP.to_string()),
            delivery_timeout: Duration::from_millis(delivery_timeout_ms),
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
        }
    }

    /// Username and password, or `MissingCredentials`
    pub fn credentials(&self) -> Result<(&str, &SecretString), TransportAuthError> {
        match (&self.username, &self.password) {
            (Some(user), Some(password)) => Ok((user.as_str(), password)),
            _ => Err(TransportAuthError::MissingCredentials),
        }
    }

    /// First `host:port` of the bootstrap list
    pub fn bootstrap_address(&self) -> Result<(String, u16), TransportAuthError> {
        parse_address(&self.bootstrap)
    }

    pub fn log_config(&self) {
        info!(
            bootstrap = %self.bootstrap,
            topic = %self.topic,
            client_id = %self.client_id,
            ca_location = ?self.ca_location,
            credentials_configured = self.credentials().is_ok(),
            delivery_timeout_ms = self.delivery_timeout.as_millis() as u64,
            "Broker configuration"
        );
    }
}

fn parse_address(bootstrap: &str) -> Result<(String, u16), TransportAuthError> {
    let invalid = || TransportAuthError::InvalidAddress(bootstrap.to_string());

    let first = bootstrap
        .split(',')
        .map(str::trim)
        .find(|s| !s.is_empty())
        .ok_or_else(invalid)?;

    let (host, port) = first.rsplit_once(':').ok_or_else(invalid)?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port: u16 = port.parse().map_err(|_| invalid())?;

    if host.is_empty() || port == 0 {
        return Err(invalid());
    }

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "KAFKA_BROKER",
        "KAFKA_USER",
        "KAFKA_PASSWORD",
        "KAFKA_TOPIC",
        "KAFKA_SSL_CA_LOCATION",
        "KAFKA_DELIVERY_TIMEOUT_MS",
        "KAFKA_CONSUMER_GROUP",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_credentials() {
        clear_env();

        let config = BrokerConfig::from_env("analytics-test");
        assert_eq!(config.bootstrap, DEFAULT_BROKER);
        assert_eq!(config.topic, "portfolio-analytics-events");
        assert_eq!(config.consumer_group, DEFAULT_CONSUMER_GROUP);
        assert_eq!(config.delivery_timeout, Duration::from_secs(30));
        assert!(config.ca_location.is_none());
        assert!(matches!(
            config.credentials(),
            Err(TransportAuthError::MissingCredentials)
        ));
    }

    #[test]
    #[serial]
    fn test_reads_credentials_and_overrides() {
        clear_env();
        std::env::set_var("KAFKA_BROKER", "broker-1.internal:9094,broker-2.internal:9094");
        std::env::set_var("KAFKA_USER", "analytics");
        std::env::set_var("KAFKA_PASSWORD", " s3cret ");
        std::env::set_var("KAFKA_TOPIC", "events-staging");
        std::env::set_var("KAFKA_DELIVERY_TIMEOUT_MS", "5000");

        let config = BrokerConfig::from_env("analytics-test");
        let (user, password) = config.credentials().unwrap();
        assert_eq!(user, "analytics");
        assert_eq!(password.expose_secret(), " s3cret ");
        assert_eq!(config.topic, "events-staging");
        assert_eq!(config.delivery_timeout, Duration::from_millis(5000));
        assert_eq!(
            config.bootstrap_address().unwrap(),
            ("broker-1.internal".to_string(), 9094)
        );

        let debug = format!("{:?}", config);
        assert!(!debug.contains("s3cret"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_password_alone_is_not_enough() {
        clear_env();
        std::env::set_var("KAFKA_PASSWORD", "secret");

        let config = BrokerConfig::from_env("analytics-test");
        assert!(config.credentials().is_err());

        clear_env();
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(
            parse_address("localhost:9093").unwrap(),
            ("localhost".to_string(), 9093)
        );
        assert_eq!(parse_address("[::1]:9093").unwrap(), ("::1".to_string(), 9093));
        assert!(parse_address("localhost").is_err());
        assert!(parse_address("localhost:notaport").is_err());
        assert!(parse_address(":9093").is_err());
        assert!(parse_address("").is_err());
    }
}
