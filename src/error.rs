//! Bridge error taxonomy
//!
//! Structural errors (`InvalidTopic`, `Serialization`) drop the offending
//! message. Delivery errors (`PublishFailure`, `CompletionTimeout`) are recorded
//! and logged. `Configuration` is fatal at startup.

use std::fmt;

use crate::config::ConfigError;
use crate::transport::TransportError;

/// Error raised while bridging a single message or starting the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Source topic is empty or cannot be mapped to a destination topic
    InvalidTopic { topic: String, reason: &'static str },
    /// Envelope could not be built or parsed
    Serialization(String),
    /// Outbound transport reported a failed delivery
    PublishFailure(String),
    /// Outbound completion did not resolve within the configured timeout
    CompletionTimeout { timeout_ms: u64 },
    /// Mandatory configuration is missing or invalid
    Configuration(String),
}

impl BridgeError {
    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::InvalidTopic { .. } => "invalid_topic",
            BridgeError::Serialization(_) => "serialization",
            BridgeError::PublishFailure(_) => "publish_failure",
            BridgeError::CompletionTimeout { .. } => "completion_timeout",
            BridgeError::Configuration(_) => "configuration",
        }
    }

    /// Structural errors cannot succeed on redelivery
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            BridgeError::InvalidTopic { .. } | BridgeError::Serialization(_)
        )
    }

    /// Publish failures and timeouts
    pub fn is_delivery_failure(&self) -> bool {
        matches!(
            self,
            BridgeError::PublishFailure(_) | BridgeError::CompletionTimeout { .. }
        )
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::InvalidTopic { topic, reason } => {
                write!(f, "Invalid topic '{}': {}", topic, reason)
            }
            BridgeError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            BridgeError::PublishFailure(msg) => write!(f, "Publish failed: {}", msg),
            BridgeError::CompletionTimeout { timeout_ms } => {
                write!(f, "Publish not completed within {}ms", timeout_ms)
            }
            BridgeError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::Serialization(e.to_string())
    }
}

impl From<TransportError> for BridgeError {
    fn from(e: TransportError) -> Self {
        match e {
                        TransportError::InvalidConfig(msg) => BridgeError::Configuration(msg),
            other => BridgeError::PublishFailure(other.to_string()),
        }
    }
}

impl From<ConfigError> for BridgeError {
    fn from(e: ConfigError) -> Self {
        BridgeError::Configuration(e.to_string())
    }
}
