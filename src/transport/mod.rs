//! Transport Abstractions
//!
//! The bridge core talks to the two brokers only through these traits:
//!
//! - [`InboundTransport`]: subscribes to source topics and yields messages in
//!   delivery order; can acknowledge a delivery.
//! - [`OutboundTransport`]: publishes a payload to a destination topic; the
//!   returned future is the completion handle and resolves once the broker
//!   confirmed (or refused) the record. Retries happen inside the transport.
//!
//! Production implementations live in [`mqtt`] and [`kafka`]; [`memory`]
//! provides in-process doubles for tests and embedding.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::bridge::InboundMessage;

pub mod kafka;
pub mod memory;
pub mod mqtt;

pub use kafka::KafkaOutbound;
pub use mqtt::MqttInbound;

/// Error type for transport operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection to the broker failed or was lost
    ConnectionLost(String),
    /// Broker rejected the operation
    Rejected(String),
    /// Operation timed out
    Timeout,
    /// Transport is shut down
    Closed,
    /// Invalid configuration
    InvalidConfig(String),
    /// Other error
    Other(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            TransportError::Rejected(msg) => write!(f, "Rejected: {}", msg),
            TransportError::Timeout => write!(f, "Operation timed out"),
            TransportError::Closed => write!(f, "Transport closed"),
            TransportError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            TransportError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// Source side of the bridge
#[async_trait]
pub trait InboundTransport: Send {
    /// Wait for the next delivered message.
    ///
    /// Returns `None` once the transport is shut down and drained.
    async fn recv(&mut self) -> Option<InboundMessage>;

    /// Acknowledge a delivery. A no-op for QoS 0 or when the transport
    /// acknowledges automatically.
    async fn ack(&mut self, message: &InboundMessage) -> Result<(), TransportError>;

    /// Stop receiving and disconnect
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Destination side of the bridge
#[async_trait]
pub trait OutboundTransport: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Publish `payload` to `topic` and wait for the broker's confirmation
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Flush buffered records before shutdown
    async fn flush(&self) -> Result<(), TransportError>;
}
