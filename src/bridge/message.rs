//! Message types flowing through the bridge

use std::time::Instant;

use bytes::Bytes;

use crate::error::BridgeError;

/// Quality of Service levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum QoS {
    /// At most once delivery
    #[default]
    AtMostOnce = 0,
    /// At least once delivery
    AtLeastOnce = 1,
    /// Exactly once delivery
    ExactlyOnce = 2,
}

impl QoS {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(QoS::AtMostOnce),
            1 => Some(QoS::AtLeastOnce),
            2 => Some(QoS::ExactlyOnce),
            _ => None,
        }
    }

    /// Deliveries at this level carry a packet id and need an acknowledgment
    pub fn requires_ack(self) -> bool {
        self != QoS::AtMostOnce
    }
}

/// A message delivered by the inbound transport. Immutable once received.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Source (MQTT) topic name
    pub source_topic: String,
    /// Raw payload
    pub payload: Bytes,
    /// Delivery QoS
    pub qos: QoS,
    /// Transport packet identifier (0 for QoS 0)
    pub packet_id: u16,
    /// Time the transport handed the message over
    pub received_at: Instant,
}

impl InboundMessage {
    pub fn new(source_topic: impl Into<String>, payload: impl Into<Bytes>, qos: QoS) -> Self {
        Self {
            source_topic: source_topic.into(),
            payload: payload.into(),
            qos,
            packet_id: 0,
            received_at: Instant::now(),
        }
    }

    /// Attach the transport packet identifier
    pub fn with_packet_id(mut self, packet_id: u16) -> Self {
        self.packet_id = packet_id;
        self
    }
}

/// Envelope addressed to its destination topic, produced once per inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedMessage {
    pub destination_topic: String,
    pub envelope: Bytes,
}

/// Result of one publish attempt, consumed by the delivery tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub destination_topic: String,
    pub success: bool,
    pub error: Option<BridgeError>,
}

impl DeliveryOutcome {
    pub fn delivered(destination_topic: impl Into<String>) -> Self {
        Self {
            destination_topic: destination_topic.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(destination_topic: impl Into<String>, error: BridgeError) -> Self {
        Self {
            destination_topic: destination_topic.into(),
            success: false,
            error: Some(error),
        }
    }
}

/// Terminal state of a message in the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Outbound transport confirmed the publish
    Acked { destination_topic: String },
    /// Message was dropped or its publish failed
    Failed(BridgeError),
}

impl Disposition {
    pub fn is_acked(&self) -> bool {
        matches!(self, Disposition::Acked { .. })
    }

    /// Error that caused the failure, if any
    pub fn error(&self) -> Option<&BridgeError> {
        match self {
            Disposition::Acked { .. } => None,
            Disposition::Failed(e) => Some(e),
        }
    }
}
