//! Append side of the topic

use std::time::Duration;

use async_trait::async_trait;
use event_schema::{Placement, DEFAULT_PARTITION};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord};
use tracing::{debug, error};

use crate::error::PublishError;

/// Appends encoded events to the analytics topic.
///
/// One call is one append attempt. Implementations wait for the broker
/// acknowledgment and return the assigned [`Placement`].
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, payload: &[u8]) -> Result<Placement, PublishError>;
}

/// rdkafka-backed publisher pinned to one partition
pub struct KafkaEventPublisher {
    producer: FutureProducer,
    topic: String,
    partition: i32,
    delivery_timeout: Duration,
}

impl KafkaEventPublisher {
    /// `producer` is expected to be configured with `acks=all` and bounded retries,
    /// as [`BrokerConnector::connect_producer`](crate::BrokerConnector::connect_producer) does.
    pub fn new(producer: FutureProducer, topic: impl Into<String>, delivery_timeout: Duration) -> Self {
        Self {
            producer,
            topic: topic.into(),
            partition: DEFAULT_PARTITION,
            delivery_timeout,
        }
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(&self, payload: &[u8]) -> Result<Placement, PublishError> {
        let record: FutureRecord<'_, (), [u8]> = FutureRecord::to(&self.topic)
            .partition(self.partition)
            .payload(payload);

        match self.producer.send(record, self.delivery_timeout).await {
            Ok((partition, offset)) => {
                debug!(topic = %self.topic, partition, offset, "Event acknowledged by broker");
                Ok(Placement { partition, offset })
            }
            Err((err, _message)) => {
                error!(topic = %self.topic, error = %err, "Broker rejected event");
                Err(classify(err))
            }
        }
    }
}

fn classify(err: KafkaError) -> PublishError {
    match err {
        KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut) => PublishError::TimedOut,
        KafkaError::MessageProduction(RDKafkaErrorCode::AllBrokersDown) => {
            PublishError::Unavailable("all brokers are down".into())
        }
        other => PublishError::Delivery(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_delivery_errors() {
        assert!(matches!(
            classify(KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut)),
            PublishError::TimedOut
        ));
        assert!(matches!(
            classify(KafkaError::MessageProduction(RDKafkaErrorCode::AllBrokersDown)),
            PublishError::Unavailable(_)
        ));
        assert!(matches!(
            classify(KafkaError::MessageProduction(RDKafkaErrorCode::MessageSizeTooLarge)),
            PublishError::Delivery(_)
        ));
    }
}
