//! MQTT to Kafka Bridge Core
//!
//! Every message received on a subscribed MQTT topic is republished to a Kafka
//! topic whose name is derived from the MQTT topic (`/` becomes `.`), wrapped
//! in a JSON envelope carrying the original payload and a capture timestamp.
//!
//! - [`TopicTranslator`]: pure topic name mapping
//! - [`EnvelopeBuilder`]: payload + timestamp to envelope bytes
//! - [`BridgePipeline`]: translate, enrich, publish, await confirmation
//! - [`DeliveryTracker`]: per-topic success/failure counters
//! - [`BridgeService`]: intake loop and inbound acknowledgment policy
//!
//! # Example Configuration
//!
//! ```toml
//! [mqtt]
//! broker_address = "tcp://localhost:1883"
//! client_id = "mqtt-kafka-bridge"
//! topics = ["sensors/#", "alerts/+"]
//! qos = 1
//! completion_timeout = 5000
//!
//! [kafka]
//! broker_address = "localhost:9092"
//! retries = 3
//! linger_ms = 5
//!
//! [bridge]
//! payload_encoding = "utf8"
//! ack_mode = "on_receive"
//! ```

mod envelope;
mod message;
mod pipeline;
mod service;
mod tracker;
mod translator;


pub use envelope::{parse as parse_envelope, Clock, Envelope, EnvelopeBuilder, MonotonicClock};
pub use message::{DeliveryOutcome, Disposition, InboundMessage, QoS, RoutedMessage};
pub use pipeline::{BridgePipeline, DEFAULT_COMPLETION_TIMEOUT};
pub use service::{BridgeService, StopReason};
pub use tracker::{DeliveryTracker, TopicStats};
pub use translator::TopicTranslator;
