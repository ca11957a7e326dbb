//! Config module tests

use super::*;

const MINIMAL: &str = r##"
[mqtt]
broker_address = "tcp://localhost:1883"
topics = ["sensors/#"]

[kafka]
broker_address = "localhost:9092"
"##;

#[test]
fn test_substitute_env_vars_simple() {
    std::env::set_var("BRIDGE_TEST_VAR_SIMPLE", "hello");
    let result = substitute_env_vars("value = \"${BRIDGE_TEST_VAR_SIMPLE}\"");
    assert_eq!(result, "value = \"hello\"");
    std::env::remove_var("BRIDGE_TEST_VAR_SIMPLE");
}

#[test]
fn test_substitute_env_vars_with_default() {
    std::env::remove_var("BRIDGE_TEST_VAR_UNSET");
    let result = substitute_env_vars("value = \"${BRIDGE_TEST_VAR_UNSET:-fallback}\"");
    assert_eq!(result, "value = \"fallback\"");

    std::env::set_var("BRIDGE_TEST_VAR_SET", "from_env");
    let result = substitute_env_vars("value = \"${BRIDGE_TEST_VAR_SET:-fallback}\"");
    assert_eq!(result, "value = \"from_env\"");
    std::env::remove_var("BRIDGE_TEST_VAR_SET");
}

#[test]
fn test_substitute_env_vars_missing_no_default() {
    std::env::remove_var("BRIDGE_TEST_VAR_MISSING");
    let result = substitute_env_vars("value = \"${BRIDGE_TEST_VAR_MISSING}\"");
    assert_eq!(result, "value = \"\"");
}

#[test]
fn test_parse_minimal_config() {
    let config = Config::parse(MINIMAL).unwrap();

    assert_eq!(config.mqtt.broker_address, "tcp://localhost:1883");
    assert_eq!(config.mqtt.topics, vec!["sensors/#".to_string()]);
    assert_eq!(config.mqtt.qos, 1);
    assert_eq!(config.mqtt.completion_timeout, 5000);
    assert_eq!(config.kafka.brokers(), vec!["localhost:9092"]);
    assert_eq!(config.bridge.payload_encoding, PayloadEncoding::Utf8);
    assert_eq!(config.bridge.ack_mode, AckMode::OnReceive);
    assert!(!config.metrics.enabled);
}

#[test]
fn test_parse_full_config() {
    let toml = r##"
[log]
level = "debug"

[mqtt]
broker_address = "ssl://mqtt.example.com:8883"
client_id = "bridge-01"
topics = "home/#, sensors/+/temp"
qos = 2
completion_timeout = 2500
username = "bridge"
password = "secret"
keep_alive = 30
clean_session = false
channel_capacity = 64

[kafka]
broker_address = "kafka1:9092,kafka2:9092"
retries = 3
batch_size = 32768
linger_ms = 10
buffer_memory = 67108864
key_serializer = "org.apache.kafka.common.serialization.StringSerializer"
value_serializer = "org.apache.kafka.common.serialization.StringSerializer"
message_timeout_ms = 30000

[kafka.properties]
"compression.type" = "snappy"

[bridge]
payload_encoding = "base64"
ack_mode = "after_publish"

[metrics]
enabled = true
bind = "127.0.0.1:9191"
"##;

    let config = Config::parse(toml).unwrap();

    assert_eq!(config.log.level, "debug");
    assert_eq!(config.mqtt.client_id, "bridge-01");
    assert_eq!(
        config.mqtt.topics,
        vec!["home/#".to_string(), "sensors/+/temp".to_string()]
    );
    assert_eq!(config.mqtt.qos, 2);
    assert_eq!(
        config.mqtt.completion_timeout_duration(),
        std::time::Duration::from_millis(2500)
    );
    assert_eq!(config.mqtt.credentials(), Some(("bridge", "secret")));
    assert!(!config.mqtt.clean_session);
    assert_eq!(config.mqtt.channel_capacity, 64);

    assert_eq!(config.kafka.brokers(), vec!["kafka1:9092", "kafka2:9092"]);
    assert_eq!(config.kafka.retries, 3);
    assert_eq!(config.kafka.value_serializer, KafkaCodec::String);
    assert_eq!(config.kafka.message_timeout_ms, Some(30000));
    assert_eq!(
        config.kafka.properties.get("compression.type").map(String::as_str),
        Some("snappy")
    );

    assert_eq!(config.bridge.payload_encoding, PayloadEncoding::Base64);
    assert_eq!(config.bridge.ack_mode, AckMode::AfterPublish);
    assert!(config.bridge.manual_acks());
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.bind.port(), 9191);
}

#[test]
fn test_camel_case_property_aliases() {
    let toml = r##"
[mqtt]
broker_address = "tcp://localhost:1883"
clientId = "legacy-client"
topic = "a/b,c/d"
completionTimeout = 1000

[kafka]
brokers = "localhost:9092"
"##;

    let config = Config::parse(toml).unwrap();
    assert_eq!(config.mqtt.client_id, "legacy-client");
    assert_eq!(config.mqtt.topics, vec!["a/b".to_string(), "c/d".to_string()]);
    assert_eq!(config.mqtt.completion_timeout, 1000);
    assert_eq!(config.kafka.broker_address, "localhost:9092");
}

#[test]
fn test_missing_mqtt_broker_is_rejected() {
    let toml = r##"
[mqtt]
topics = ["sensors/#"]

[kafka]
broker_address = "localhost:9092"
"##;
    let err = Config::parse(toml).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
    assert!(err.to_string().contains("mqtt.broker_address"));
}

#[test]
fn test_missing_topics_are_rejected() {
    let toml = r##"
[mqtt]
broker_address = "tcp://localhost:1883"
topics = []

[kafka]
broker_address = "localhost:9092"
"##;
    let err = Config::parse(toml).unwrap_err();
    assert!(err.to_string().contains("mqtt.topics"));
}

#[test]
fn test_missing_kafka_broker_is_rejected() {
    let toml = r##"
[mqtt]
broker_address = "tcp://localhost:1883"
topics = ["sensors/#"]
"##;
    let err = Config::parse(toml).unwrap_err();
    assert!(err.to_string().contains("kafka.broker_address"));
}

#[test]
fn test_unsupported_serializer_is_rejected() {
    let toml = format!(
        "{}\nvalue_serializer = \"io.confluent.kafka.serializers.KafkaAvroSerializer\"\n",
        MINIMAL
    );
    assert!(matches!(
        Config::parse(&toml),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_invalid_qos_is_rejected() {
    let toml = MINIMAL.replace("topics = [\"sensors/#\"]", "topics = [\"sensors/#\"]\nqos = 3");
    assert!(matches!(
        Config::parse(&toml),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn test_load_config_with_env_substitution() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("bridge.toml");

    std::env::set_var("BRIDGE_TEST_MQTT_HOST", "10.0.0.7");

    let config_content = r##"
[mqtt]
broker_address = "tcp://${BRIDGE_TEST_MQTT_HOST}:1883"
topics = ["plant/#"]
qos = ${BRIDGE_TEST_QOS_UNSET:-0}

[kafka]
broker_address = "${BRIDGE_TEST_KAFKA_UNSET:-kafka:9092}"
"##;

    std::fs::write(&config_path, config_content).unwrap();

    let config = Config::load(&config_path).unwrap();
    assert_eq!(config.mqtt.broker_address, "tcp://10.0.0.7:1883");
    assert_eq!(config.mqtt.qos, 0);
    assert_eq!(config.kafka.broker_address, "kafka:9092");
    assert_eq!(config.mqtt.channel_capacity, 1024);

    std::env::remove_var("BRIDGE_TEST_MQTT_HOST");
}

#[test]
fn test_load_missing_file_without_env_fails_validation() {
    let temp_dir = tempfile::tempdir().unwrap();
    let err = Config::load(temp_dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn test_read_allows_overrides_before_validation() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("bridge.toml");
    std::fs::write(&config_path, "[mqtt]\ntopics = [\"plant/#\"]\n").unwrap();

    let mut config = Config::read(&config_path).unwrap();
    assert!(config.validate().is_err());

    config.mqtt.broker_address = "tcp://localhost:1883".to_string();
    config.kafka.broker_address = "localhost:9092".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_camel_case_aliases_from_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("bridge.toml");

    let config_content = r##"
[mqtt]
broker_address = "tcp://localhost:1883"
clientId = "legacy-client"
topic = "a/b,c/d"
completionTimeout = 1000

[kafka]
broker_address = "localhost:9092"

[kafka.properties]
"compression.type" = "lz4"
"##;
    std::fs::write(&config_path, config_content).unwrap();

    let config = Config::load(&config_path).unwrap();
    assert_eq!(config.mqtt.client_id, "legacy-client");
    assert_eq!(config.mqtt.topics, vec!["a/b".to_string(), "c/d".to_string()]);
    assert_eq!(config.mqtt.completion_timeout, 1000);
    assert_eq!(
        config.kafka.properties.get("compression.type").map(String::as_str),
        Some("lz4")
    );

    // Unset fields still fall back to their defaults
    assert_eq!(config.mqtt.qos, 1);
    assert_eq!(config.mqtt.keep_alive, 60);
    assert_eq!(config.kafka.batch_size, 16384);
    assert_eq!(config.bridge.ack_mode, AckMode::OnReceive);
}
