//! MQTT Source Configuration
//!
//! Settings for the inbound MQTT subscription.

use std::time::Duration;

use serde::Deserialize;

use super::{string_or_list, ConfigError};
use crate::bridge::QoS;

/// MQTT connection scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqttScheme {
    /// Plain MQTT over TCP (`tcp://`, `mqtt://`)
    Tcp,
    /// MQTT over TLS (`ssl://`, `mqtts://`)
    Tls,
}

impl MqttScheme {
    /// Get default port for this scheme
    pub fn default_port(&self) -> u16 {
        match self {
            MqttScheme::Tcp => 1883,
            MqttScheme::Tls => 8883,
        }
    }
}

/// Configuration for the MQTT side of the bridge
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker address, e.g. `tcp://localhost:1883`
    #[serde(alias = "broker")]
    pub broker_address: String,

    /// Client ID used when connecting to the broker
    #[serde(alias = "clientId")]
    pub client_id: String,

    /// Topic filters to subscribe to
    #[serde(alias = "topic", deserialize_with = "string_or_list")]
    pub topics: Vec<String>,

    /// Subscription QoS (0, 1 or 2)
    pub qos: u8,

    /// Completion timeout in milliseconds; bounds each outbound publish
    #[serde(alias = "completionTimeout")]
    pub completion_timeout: u64,

    /// Username for authentication
    pub username: Option<String>,

    /// Password for authentication
    pub password: Option<String>,

    /// Keep-alive interval in seconds
    pub keep_alive: u64,

    /// Use a clean session (no session persistence on the broker)
    pub clean_session: bool,

    /// Capacity of the channel between the MQTT event loop and the pipeline
    pub channel_capacity: usize,
}

fn default_client_id() -> String {
    format!("mqtt-kafka-bridge-{}", std::process::id())
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_address: String::new(),
            client_id: default_client_id(),
            topics: Vec::new(),
            qos: 1,
            completion_timeout: 5000,
            username: None,
            password: None,
            keep_alive: 60,
            clean_session: true,
            channel_capacity: 1024,
        }
    }
}

impl MqttConfig {
    /// Get the completion timeout as Duration
    pub fn completion_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.completion_timeout)
    }

    /// Get the keep-alive interval as Duration
    pub fn keep_alive_duration(&self) -> Duration {
        Duration::from_secs(self.keep_alive)
    }

    /// Subscription QoS; call after `validate`
    pub fn subscription_qos(&self) -> QoS {
        QoS::from_u8(self.qos).unwrap_or(QoS::AtLeastOnce)
    }

    /// Credentials, only when a non-empty username is configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match self.username.as_deref() {
            Some(user) if !user.is_empty() => {
                Some((user, self.password.as_deref().unwrap_or("")))
            }
            _ => None,
        }
    }

    /// Parse the broker address into scheme, host and port.
    ///
    /// Accepts `tcp://`, `mqtt://`, `ssl://`, `mqtts://`, `tls://` or a bare
    /// `host[:port]`.
    pub fn parse_address(&self) -> Result<(MqttScheme, String, u16), ConfigError> {
        let address = self.broker_address.trim();
        let (scheme, rest) = match address.split_once("://") {
            Some((scheme, rest)) => {
                let scheme = match scheme.to_ascii_lowercase().as_str() {
                    "tcp" | "mqtt" => MqttScheme::Tcp,
                    "ssl" | "mqtts" | "tls" => MqttScheme::Tls,
                    other => {
                        return Err(ConfigError::Validation(format!(
                            "mqtt.broker_address: unsupported scheme '{}'",
                            other
                        )))
                    }
                };
                (scheme, rest)
            }
            None => (MqttScheme::Tcp, address),
        };

        let rest = rest.trim_end_matches('/');
        if rest.is_empty() {
            return Err(ConfigError::Validation(
                "mqtt.broker_address has no host".to_string(),
            ));
        }

        if let Some((host, port_str)) = rest.rsplit_once(':') {
            let port = port_str.parse::<u16>().map_err(|_| {
                ConfigError::Validation(format!(
                    "mqtt.broker_address: invalid port '{}'",
                    port_str
                ))
            })?;
            return Ok((scheme, host.to_string(), port));
        }

        Ok((scheme, rest.to_string(), scheme.default_port()))
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.broker_address.trim().is_empty() {
            return Err(ConfigError::Validation(
                "mqtt.broker_address is required".to_string(),
            ));
        }
        self.parse_address()?;

        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "mqtt.client_id cannot be empty".to_string(),
            ));
        }

        if self.topics.is_empty() {
            return Err(ConfigError::Validation(
                "mqtt.topics must list at least one topic".to_string(),
            ));
        }
        if let Some(pos) = self.topics.iter().position(|t| t.is_empty()) {
            return Err(ConfigError::Validation(format!(
                "mqtt.topics entry {} is empty",
                pos
            )));
        }

        if self.qos > 2 {
            return Err(ConfigError::Validation(
                "mqtt.qos must be 0, 1, or 2".to_string(),
            ));
        }

        if self.completion_timeout == 0 {
            return Err(ConfigError::Validation(
                "mqtt.completion_timeout must be greater than 0".to_string(),
            ));
        }

        if self.channel_capacity == 0 {
            return Err(ConfigError::Validation(
                "mqtt.channel_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_address(address: &str) -> MqttConfig {
        MqttConfig {
            broker_address: address.to_string(),
            topics: vec!["sensors/#".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_address_with_scheme() {
        let (scheme, host, port) = with_address("tcp://192.168.4.41:1883")
            .parse_address()
            .unwrap();
        assert_eq!(scheme, MqttScheme::Tcp);
        assert_eq!(host, "192.168.4.41");
        assert_eq!(port, 1883);
    }

    #[test]
    fn test_parse_address_tls_default_port() {
        let (scheme, host, port) = with_address("ssl://broker.example.com")
            .parse_address()
            .unwrap();
        assert_eq!(scheme, MqttScheme::Tls);
        assert_eq!(host, "broker.example.com");
        assert_eq!(port, 8883);
    }

    #[test]
    fn test_parse_address_bare_host() {
        let (scheme, host, port) = with_address("localhost").parse_address().unwrap();
        assert_eq!(scheme, MqttScheme::Tcp);
        assert_eq!(host, "localhost");
        assert_eq!(port, 1883);
    }

    #[test]
    fn test_parse_address_rejects_bad_input() {
        assert!(with_address("ws://localhost:80").parse_address().is_err());
        assert!(with_address("tcp://localhost:notaport")
            .parse_address()
            .is_err());
        assert!(with_address("tcp://").parse_address().is_err());
    }

    #[test]
    fn test_credentials_require_username() {
        let mut config = with_address("localhost");
        assert!(config.credentials().is_none());

        config.password = Some("secret".to_string());
        assert!(config.credentials().is_none());

        config.username = Some("bridge".to_string());
        assert_eq!(config.credentials(), Some(("bridge", "secret")));

        config.username = Some(String::new());
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_validate_mandatory_fields() {
        assert!(with_address("localhost").validate().is_ok());
        assert!(with_address("").validate().is_err());

        let mut config = with_address("localhost");
        config.topics.clear();
        assert!(config.validate().is_err());

        let mut config = with_address("localhost");
        config.topics.push(String::new());
        assert!(config.validate().is_err());

        let mut config = with_address("localhost");
        config.qos = 3;
        assert!(config.validate().is_err());

        let mut config = with_address("localhost");
        config.completion_timeout = 0;
        assert!(config.validate().is_err());
    }
}
