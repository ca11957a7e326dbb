//! mqtt-kafka-bridge - Republishes MQTT messages to Kafka
//!
//! Subscribes to a set of MQTT topics and forwards every message to the Kafka
//! topic derived from its MQTT topic, wrapped in a timestamped JSON envelope.

pub mod bridge;
pub mod config;
pub mod error;
pub mod metrics;
pub mod transport;

pub use bridge::{BridgePipeline, BridgeService, DeliveryTracker, Disposition, TopicTranslator};
pub use config::Config;
pub use error::BridgeError;
pub use metrics::{Metrics, MetricsServer};
pub use transport::{InboundTransport, KafkaOutbound, MqttInbound, OutboundTransport};
