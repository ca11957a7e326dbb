//! Kafka Outbound Transport
//!
//! Publishes envelopes with an rdkafka `FutureProducer`. Records carry no key
//! so partition assignment is left to the producer's default partitioner.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use tracing::{debug, info, warn};

use super::{OutboundTransport, TransportError};
use crate::config::KafkaConfig;

/// How long shutdown waits for in-flight records
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the producer client configuration
pub fn client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    for (key, value) in config.producer_properties() {
        client.set(key, value);
    }
    client
}

fn map_send_error(error: KafkaError) -> TransportError {
    match error {
        KafkaError::Canceled => TransportError::Closed,
        KafkaError::ClientCreation(msg) => TransportError::InvalidConfig(msg),
        other => TransportError::Rejected(other.to_string()),
    }
}

/// Outbound transport backed by a Kafka producer
pub struct KafkaOutbound {
    producer: FutureProducer,
    brokers: String,
}

impl KafkaOutbound {
    /// Create the producer. Connections are established lazily by librdkafka.
    pub fn new(config: &KafkaConfig) -> Result<Self, TransportError> {
        let producer: FutureProducer = client_config(config)
            .create()
            .map_err(|e| TransportError::InvalidConfig(format!("failed to create producer: {}", e)))?;

        let brokers = config.brokers().join(",");
        info!(
            "Kafka: Producer created for {} (key={}, value={}, retries={}, batch.size={}, linger.ms={})",
            brokers,
            config.key_serializer,
            config.value_serializer,
            config.retries,
            config.batch_size,
            config.linger_ms
        );

        Ok(Self { producer, brokers })
    }
}

#[async_trait]
impl OutboundTransport for KafkaOutbound {
    fn name(&self) -> &str {
        &self.brokers
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        let record = FutureRecord::<(), [u8]>::to(topic).payload(payload.as_ref());

        // Queue-full waits here; the caller bounds the total wait
        match self.producer.send(record, Timeout::Never).await {
            Ok((partition, offset)) => {
                debug!(
                    "Kafka: Delivered to {} [partition={}, offset={}]",
                    topic, partition, offset
                );
                Ok(())
            }
            Err((error, _message)) => Err(map_send_error(error)),
        }
    }

    async fn flush(&self) -> Result<(), TransportError> {
        let producer = self.producer.clone();
        let result = tokio::task::spawn_blocking(move || producer.flush(FLUSH_TIMEOUT))
            .await
            .map_err(|e| TransportError::Other(format!("flush task failed: {}", e)))?;

        match result {
            Ok(()) => {
                info!("Kafka: Producer flushed");
                Ok(())
            }
            Err(e) => {
                warn!("Kafka: Flush incomplete: {}", e);
                Err(TransportError::Timeout)
            }
        }
    }
}
