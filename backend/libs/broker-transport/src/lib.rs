//! Authenticated Kafka transport for the analytics pipeline.
//!
//! Both roles (publish and consume) connect the same way: TLS with verified
//! certificates, then SCRAM-SHA-256 over the Kafka SASL handshake. Anything
//! short of that fails the attempt.
//!
//! ```rust,ignore
//! let connector = BrokerConnector::new(BrokerConfig::from_env("analytics-service"));
//! let publisher = connector.connect_producer().await?;
//! let placement = publisher.publish(&event.to_wire()?).await?;
//! ```

pub mod config;
pub mod connector;
pub mod cursor;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod publisher;
pub mod sasl;
pub mod scram;
pub mod tls;

pub use config::BrokerConfig;
pub use connector::BrokerConnector;
pub use cursor::{BrokerMessage, KafkaPartitionCursor, PartitionCursor};
pub use error::{AuthInitError, AuthProtocolError, ConsumeError, PublishError, TransportAuthError};
#[cfg(any(test, feature = "test-util"))]
pub use memory::{MemoryCursor, MemoryEventLog};
pub use publisher::{EventPublisher, KafkaEventPublisher};
pub use scram::{ScramClient, ScramConversation, ScramMechanism, ScramTranscript};
