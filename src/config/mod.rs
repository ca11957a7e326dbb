//! Configuration Module
//!
//! Provides TOML-based configuration for the bridge with support for:
//! - MQTT source settings (broker, client id, topics, QoS, credentials)
//! - Kafka producer settings (brokers, retries, batching, buffering)
//! - Bridge behaviour (payload encoding, inbound acknowledgment mode)
//! - Metrics endpoint
//! - Environment variable overrides (BRIDGE__* prefix)
//!
//! Every collaborator receives its section by construction; nothing reads
//! configuration from global state.

use std::path::Path;

use config::{Environment, File, FileFormat};
use regex::Regex;
use serde::{Deserialize, Deserializer};

pub use bridge::{AckMode, BridgeSettings, PayloadEncoding};
pub use kafka::{KafkaCodec, KafkaConfig};
pub use metrics::MetricsConfig;
pub use mqtt::{MqttConfig, MqttScheme};

mod bridge;
mod kafka;
mod metrics;
mod mqtt;

#[cfg(test)]
mod tests;

/// Substitute environment variables in a string.
/// Supports `${VAR}` and `${VAR:-default}` syntax.
fn substitute_env_vars(content: &str) -> String {
    let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("valid env var pattern");
    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

/// Accept either a TOML array or a comma separated string.
///
/// Environment overrides and `.properties`-style values arrive as a single
/// string, e.g. `BRIDGE__MQTT__TOPICS="sensors/#,alerts/#"`.
pub(crate) fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    let items = match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => s.split(',').map(|t| t.trim().to_string()).collect(),
        StringOrList::Many(v) => v.into_iter().map(|t| t.trim().to_string()).collect(),
    };
    Ok(items)
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// Config crate error
    Config(config::ConfigError),
    /// Mandatory field missing or invalid
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Config(e) => write!(f, "Config error: {}", e),
            ConfigError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        ConfigError::Config(e)
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,
    /// MQTT source configuration
    pub mqtt: MqttConfig,
    /// Kafka destination configuration
    pub kafka: KafkaConfig,
    /// Bridge pipeline behaviour
    pub bridge: BridgeSettings,
    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// Supports two forms of environment variable usage:
    /// 1. In-file substitution: `${VAR}` or `${VAR:-default}` syntax in the TOML file
    /// 2. Override via env vars: `BRIDGE__` prefix with double underscores for nesting:
    ///    - `BRIDGE__MQTT__BROKER_ADDRESS=tcp://10.0.0.5:1883` overrides `mqtt.broker_address`
    ///    - `BRIDGE__MQTT__TOPICS=sensors/#,alerts/#` overrides `mqtt.topics`
    ///    - `BRIDGE__KAFKA__BROKER_ADDRESS=kafka1:9092,kafka2:9092` overrides `kafka.broker_address`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`] but without validation, so callers can apply
    /// further overrides first.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Defaults live in the serde `Default` impls only
        let mut builder = config::Config::builder();

        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let substituted = substitute_env_vars(&content);
                builder = builder.add_source(File::from_str(&substituted, FileFormat::Toml));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File doesn't exist, rely on defaults and environment
            }
            Err(e) => return Err(ConfigError::Io(e)),
        }

        let cfg = builder
            .add_source(
                Environment::with_prefix("BRIDGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(cfg.try_deserialize()?)
    }

    /// Load configuration from environment variables only (no file).
    ///
    /// Useful for containerized deployments where all config comes from env vars.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Path::new(""))
    }

    /// Parse configuration from a string (for testing, no env var support)
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// A failure here must stop the process before any message is accepted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mqtt.validate()?;
        self.kafka.validate()?;

        if self.bridge.ack_mode == AckMode::AfterPublish && self.mqtt.clean_session {
            // Unacknowledged deliveries are only redelivered on session resumption
            tracing::warn!(
                "bridge.ack_mode = after_publish with mqtt.clean_session = true: \
                 failed messages will not be redelivered after reconnect"
            );
        }

        Ok(())
    }
}
