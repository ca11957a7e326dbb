//! Bridge Pipeline Configuration
//!
//! Behavioural switches for the MQTT → Kafka pipeline.

use serde::Deserialize;

/// How non-UTF-8 payloads are placed into the JSON envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    /// Payload must be valid UTF-8, anything else is dropped as a serialization error
    #[default]
    Utf8,
    /// Invalid sequences are replaced with U+FFFD
    Lossy,
    /// Payload is always base64 encoded (standard alphabet, padded)
    Base64,
}

/// When inbound MQTT deliveries are acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// Acknowledge on receipt; publish failures are logged only
    #[default]
    OnReceive,
    /// Acknowledge only after the Kafka publish succeeded (or the message was
    /// structurally invalid and can never succeed)
    AfterPublish,
}

/// Pipeline settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Payload encoding policy
    pub payload_encoding: PayloadEncoding,
    /// Inbound acknowledgment mode
    pub ack_mode: AckMode,
}

impl BridgeSettings {
    /// Whether the inbound client must use manual acknowledgments
    pub fn manual_acks(&self) -> bool {
        self.ack_mode == AckMode::AfterPublish
    }
}
