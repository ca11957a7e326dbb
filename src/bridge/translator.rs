//! Topic Translation
//!
//! Maps MQTT topic names onto Kafka topic names by replacing the MQTT level
//! separator (`/`) with the Kafka naming separator (`.`). Nothing else is
//! escaped or normalized: `/a/b/` becomes `.a.b.`.
//!
//! Rejected topics:
//! - empty names
//! - names containing a null character or MQTT wildcards (`+`, `#`)
//! - names whose translation is not a legal Kafka topic (longer than 249
//!   characters, `.` or `..`, or characters outside `[A-Za-z0-9._-]`)

use crate::error::BridgeError;

/// Level separator in MQTT topic names
pub const MQTT_SEPARATOR: char = '/';

/// Naming separator used for Kafka topics
pub const KAFKA_SEPARATOR: char = '.';

/// Longest topic name Kafka accepts
pub const MAX_KAFKA_TOPIC_LEN: usize = 249;

/// Translates source topic names to destination topic names
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicTranslator;

impl TopicTranslator {
    pub fn new() -> Self {
        Self
    }

    /// Translate an MQTT topic name to its Kafka topic name.
    ///
    /// Pure and deterministic: the same input always yields the same output.
    pub fn translate(&self, source_topic: &str) -> Result<String, BridgeError> {
        validate_source(source_topic).map_err(|reason| invalid(source_topic, reason))?;

        let destination = source_topic.replace(MQTT_SEPARATOR, &KAFKA_SEPARATOR.to_string());

        validate_destination(&destination).map_err(|reason| invalid(source_topic, reason))?;

        Ok(destination)
    }
}

fn invalid(topic: &str, reason: &'static str) -> BridgeError {
    BridgeError::InvalidTopic {
        topic: topic.to_string(),
        reason,
    }
}

/// Validate an MQTT topic name as delivered by the broker
fn validate_source(topic: &str) -> Result<(), &'static str> {
    if topic.is_empty() {
        return Err("topic name cannot be empty");
    }

    if topic.contains('\0') {
        return Err("topic name cannot contain null character");
    }

    if topic.contains('+') || topic.contains('#') {
        return Err("topic name cannot contain wildcards");
    }

    Ok(())
}

/// Validate a translated name against Kafka's topic naming rules
fn validate_destination(topic: &str) -> Result<(), &'static str> {
    if topic.len() > MAX_KAFKA_TOPIC_LEN {
        return Err("translated topic exceeds Kafka's 249 character limit");
    }

    if topic == "." || topic == ".." {
        return Err("translated topic cannot be '.' or '..'");
    }

    if !topic
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err("translated topic contains characters Kafka does not allow");
    }

    Ok(())
}
