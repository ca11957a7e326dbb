//! Kafka Destination Configuration
//!
//! Producer tuning knobs are carried as opaque values and handed to the
//! producer client unchanged.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use super::ConfigError;

/// Key/value codec identifier
///
/// Accepts the short names (`string`, `bytes`) as well as the Kafka client
/// serializer class names used by JVM deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum KafkaCodec {
    /// UTF-8 string codec
    #[default]
    String,
    /// Raw byte array codec
    Bytes,
}

impl TryFrom<String> for KafkaCodec {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let short = value.rsplit('.').next().unwrap_or(&value);
        match short.to_ascii_lowercase().as_str() {
            "string" | "stringserializer" => Ok(KafkaCodec::String),
            "bytes" | "bytearray" | "bytearrayserializer" | "bytesserializer" => {
                Ok(KafkaCodec::Bytes)
            }
            _ => Err(format!("unsupported kafka serializer '{}'", value)),
        }
    }
}

impl std::fmt::Display for KafkaCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KafkaCodec::String => write!(f, "string"),
            KafkaCodec::Bytes => write!(f, "bytes"),
        }
    }
}

/// Configuration for the Kafka side of the bridge
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Comma separated bootstrap servers, e.g. `kafka1:9092,kafka2:9092`
    #[serde(alias = "brokers", alias = "bootstrap_servers")]
    pub broker_address: String,

    /// Producer retry count
    pub retries: u32,

    /// Batch size in bytes
    pub batch_size: u32,

    /// Linger time in milliseconds
    pub linger_ms: u64,

    /// Producer buffer memory in bytes
    pub buffer_memory: u64,

    /// Record key codec
    pub key_serializer: KafkaCodec,

    /// Record value codec
    pub value_serializer: KafkaCodec,

    /// Local delivery timeout in milliseconds (librdkafka `message.timeout.ms`)
    pub message_timeout_ms: Option<u64>,

    /// Additional producer properties passed through verbatim
    pub properties: BTreeMap<String, String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            broker_address: String::new(),
            retries: 0,
            batch_size: 16384,
            linger_ms: 1,
            buffer_memory: 33_554_432,
            key_serializer: KafkaCodec::default(),
            value_serializer: KafkaCodec::default(),
            message_timeout_ms: None,
            properties: BTreeMap::new(),
        }
    }
}

impl KafkaConfig {
    /// Individual bootstrap servers
    pub fn brokers(&self) -> Vec<&str> {
        self.broker_address
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Get linger as Duration
    pub fn linger_duration(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }

    /// Producer client properties in librdkafka naming.
    ///
    /// Entries from `properties` are applied last and win over the named knobs.
    pub fn producer_properties(&self) -> Vec<(String, String)> {
        let mut props = vec![
            ("bootstrap.servers".to_string(), self.brokers().join(",")),
            ("retries".to_string(), self.retries.to_string()),
            ("batch.size".to_string(), self.batch_size.to_string()),
            ("linger.ms".to_string(), self.linger_ms.to_string()),
            (
                "queue.buffering.max.kbytes".to_string(),
                (self.buffer_memory / 1024).max(1).to_string(),
            ),
        ];

        if let Some(timeout) = self.message_timeout_ms {
            props.push(("message.timeout.ms".to_string(), timeout.to_string()));
        }

        for (key, value) in &self.properties {
            props.retain(|(k, _)| k != key);
            props.push((key.clone(), value.clone()));
        }

        props
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.brokers().is_empty() {
            return Err(ConfigError::Validation(
                "kafka.broker_address is required".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(ConfigError::Validation(
                "kafka.batch_size must be greater than 0".to_string(),
            ));
        }

        if self.buffer_memory == 0 {
            return Err(ConfigError::Validation(
                "kafka.buffer_memory must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
