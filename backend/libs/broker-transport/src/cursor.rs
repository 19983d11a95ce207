//! Read side of the topic

use async_trait::async_trait;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::{Message, Offset, TopicPartitionList};
use tracing::info;

use crate::error::{ConsumeError, TransportAuthError};

/// One message read from the partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub partition: i32,
    pub offset: i64,
    /// `None` for tombstones or empty records
    pub payload: Option<Vec<u8>>,
}

/// Ordered reader over a single partition.
///
/// Transport errors are returned per call; the cursor stays usable afterwards.
#[async_trait]
pub trait PartitionCursor: Send {
    async fn next_message(&mut self) -> Result<BrokerMessage, ConsumeError>;
}

/// rdkafka consumer manually assigned to one partition
pub struct KafkaPartitionCursor {
    consumer: StreamConsumer,
}

impl KafkaPartitionCursor {
    /// Assign `consumer` to `(topic, partition)` starting at the newest offset
    pub fn assign(
        consumer: StreamConsumer,
        topic: &str,
        partition: i32,
    ) -> Result<Self, TransportAuthError> {
        let mut assignment = TopicPartitionList::new();
        assignment.add_partition_offset(topic, partition, Offset::End)?;
        consumer.assign(&assignment)?;

        info!(topic, partition, "Cursor assigned at newest offset");
        Ok(Self { consumer })
    }
}

#[async_trait]
impl PartitionCursor for KafkaPartitionCursor {
    async fn next_message(&mut self) -> Result<BrokerMessage, ConsumeError> {
        let message = self.consumer.recv().await?;

        Ok(BrokerMessage {
            partition: message.partition(),
            offset: message.offset(),
            payload: message.payload().map(<[u8]>::to_vec),
        })
    }
}
