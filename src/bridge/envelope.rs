//! Envelope Construction
//!
//! Wraps an inbound payload and its capture time into the JSON object
//! published downstream:
//!
//! ```json
//! {"payload":"42.5","timestamp":"1718000000000"}
//! ```
//!
//! Both keys are fixed contract strings and the timestamp is serialized as a
//! string of epoch milliseconds.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::PayloadEncoding;
use crate::error::BridgeError;

/// Enriched representation of a message sent downstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Original payload as text
    pub payload: String,
    /// Capture time in milliseconds since the Unix epoch
    #[serde(with = "millis_as_string")]
    pub timestamp: i64,
}

mod millis_as_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(millis: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&millis.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<i64>().map_err(de::Error::custom)
    }
}

/// Builds serialized envelopes according to the configured payload encoding
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeBuilder {
    encoding: PayloadEncoding,
}

impl EnvelopeBuilder {
    pub fn new(encoding: PayloadEncoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> PayloadEncoding {
        self.encoding
    }

    /// Serialize `payload` captured at `captured_at_millis` into envelope bytes.
    ///
    /// With [`PayloadEncoding::Utf8`] a payload that is not valid UTF-8 is a
    /// serialization error.
    pub fn build(&self, payload: &[u8], captured_at_millis: i64) -> Result<Bytes, BridgeError> {
        let text = match self.encoding {
            PayloadEncoding::Utf8 => std::str::from_utf8(payload)
                .map_err(|e| BridgeError::Serialization(format!("payload is not UTF-8: {}", e)))?
                .to_string(),
            PayloadEncoding::Lossy => String::from_utf8_lossy(payload).into_owned(),
            PayloadEncoding::Base64 => base64::engine::general_purpose::STANDARD.encode(payload),
        };

        let envelope = Envelope {
            payload: text,
            timestamp: captured_at_millis,
        };

        Ok(Bytes::from(serde_json::to_vec(&envelope)?))
    }
}

/// Parse serialized envelope bytes
pub fn parse(bytes: &[u8]) -> Result<Envelope, BridgeError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Source of capture timestamps
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;
}

/// Wall clock that never goes backwards.
///
/// Readings are clamped to the highest value handed out so far, so envelopes
/// built in processing order carry non-decreasing timestamps even if the
/// system clock is stepped back.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn system_millis() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    /// Clamp a raw reading against previous readings
    fn observe(&self, raw: i64) -> i64 {
        let previous = self.last.fetch_max(raw, Ordering::AcqRel);
        previous.max(raw)
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> i64 {
        self.observe(Self::system_millis())
    }
}
