//! Builds authenticated broker clients for both roles.
//!
//! Every connection starts with a SCRAM-over-TLS preflight against the
//! bootstrap broker. Only when that succeeds are the long-lived rdkafka
//! clients created, with the same `SASL_SSL` settings. A failed preflight
//! never degrades to plaintext.

use event_schema::DEFAULT_PARTITION;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::StreamConsumer;
use rdkafka::producer::FutureProducer;
use resilience::{with_timeout_result, TimeoutError};
use secrecy::ExposeSecret;
use tracing::{info, warn};

use crate::config::BrokerConfig;
use crate::cursor::KafkaPartitionCursor;
use crate::error::TransportAuthError;
use crate::publisher::KafkaEventPublisher;
use crate::sasl::SaslSession;
use crate::scram::{ScramClient, ScramMechanism};
use crate::tls;

/// Mechanism used by both the publisher and the subscriber
pub const MECHANISM: ScramMechanism = ScramMechanism::Sha256;

const MESSAGE_SEND_MAX_RETRIES: &str = "5";

pub struct BrokerConnector {
    config: BrokerConfig,
}

impl BrokerConnector {
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }

    /// Authenticate once against the bootstrap broker and drop the connection.
    pub async fn verify_credentials(&self) -> Result<(), TransportAuthError> {
        let (username, password) = self.config.credentials()?;
        let scram = ScramClient::new(MECHANISM, username, password, None)?;
        let (host, port) = self.config.bootstrap_address()?;
        let tls_config = tls::client_config(self.config.ca_location.as_deref())?;

        let preflight = async {
            let stream = tls::connect_tls(tls_config, &host, port).await?;
            let mut session = SaslSession::new(stream, self.config.client_id.clone());

            session.handshake(MECHANISM.name()).await?;
            let mut conversation = scram.begin()?;
            session.authenticate(&mut conversation).await?;

            Ok::<_, TransportAuthError>(())
        };

        match with_timeout_result(self.config.handshake_timeout, preflight).await {
            Ok(()) => {
                info!(
                    broker = %host,
                    port,
                    mechanism = MECHANISM.name(),
                    "Broker authentication verified"
                );
                Ok(())
            }
            Err(TimeoutError::Elapsed(_)) => Err(TransportAuthError::TimedOut),
            Err(TimeoutError::Failed(e)) => {
                warn!(broker = %host, port, error = %e, "Broker authentication failed");
                Err(e)
            }
        }
    }

    /// rdkafka settings shared by producer and consumer
    pub fn client_config(&self) -> Result<ClientConfig, TransportAuthError> {
        let (username, password) = self.config.credentials()?;

        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.config.bootstrap)
            .set("client.id", &self.config.client_id)
            .set("security.protocol", "SASL_SSL")
            .set("sasl.mechanism", MECHANISM.name())
            .set("sasl.username", username)
            .set("sasl.password", password.expose_secret())
            .set("enable.ssl.certificate.verification", "true")
            .set("ssl.endpoint.identification.algorithm", "https");

        if let Some(ca) = &self.config.ca_location {
            client_config.set("ssl.ca.location", ca.to_string_lossy());
        }

        Ok(client_config)
    }

    pub async fn connect_producer(&self) -> Result<KafkaEventPublisher, TransportAuthError> {
        self.verify_credentials().await?;

        let producer: FutureProducer = self
            .client_config()?
            .set("acks", "all")
            .set("message.send.max.retries", MESSAGE_SEND_MAX_RETRIES)
            .set(
                "message.timeout.ms",
                self.config.delivery_timeout.as_millis().to_string(),
            )
            .create()?;

        info!(topic = %self.config.topic, "Kafka producer ready");
        Ok(KafkaEventPublisher::new(
            producer,
            self.config.topic.clone(),
            self.config.delivery_timeout,
        ))
    }

    pub async fn connect_consumer(&self) -> Result<KafkaPartitionCursor, TransportAuthError> {
        self.verify_credentials().await?;

        let consumer: StreamConsumer = self
            .client_config()?
            .set("group.id", &self.config.consumer_group)
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false")
            .create()?;

        KafkaPartitionCursor::assign(consumer, &self.config.topic, DEFAULT_PARTITION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config(username: Option<&str>, password: Option<&str>) -> BrokerConfig {
        BrokerConfig {
            bootstrap: "broker.internal:9093".into(),
            username: username.map(str::to_owned),
            password: password.map(|p| SecretString::from(p.to_string())),
            topic: "portfolio-analytics-events".into(),
            ca_location: Some(PathBuf::from("/etc/kafka/ca.pem")),
            client_id: "analytics-test".into(),
            consumer_group: "portfolio-analytics-consumer".into(),
            delivery_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_client_config_is_sasl_ssl() {
        let connector = BrokerConnector::new(config(Some("analytics"), Some("secret")));
        let client_config = connector.client_config().unwrap();

        assert_eq!(client_config.get("security.protocol"), Some("SASL_SSL"));
        assert_eq!(client_config.get("sasl.mechanism"), Some("SCRAM-SHA-256"));
        assert_eq!(client_config.get("sasl.username"), Some("analytics"));
        assert_eq!(
            client_config.get("enable.ssl.certificate.verification"),
            Some("true")
        );
        assert_eq!(
            client_config.get("ssl.endpoint.identification.algorithm"),
            Some("https")
        );
        assert_eq!(client_config.get("ssl.ca.location"), Some("/etc/kafka/ca.pem"));
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_connecting() {
        let connector = BrokerConnector::new(config(None, None));

        assert!(matches!(
            connector.client_config(),
            Err(TransportAuthError::MissingCredentials)
        ));
        assert!(matches!(
            connector.verify_credentials().await,
            Err(TransportAuthError::MissingCredentials)
        ));
        assert!(matches!(
            connector.connect_producer().await,
            Err(TransportAuthError::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn test_control_characters_fail_initialization() {
        let connector = BrokerConnector::new(config(Some("analytics"), Some("pass\u{0}word")));

        assert!(matches!(
            connector.verify_credentials().await,
            Err(TransportAuthError::Init(_))
        ));
    }
}
