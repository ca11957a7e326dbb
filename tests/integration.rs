//! Bridge Integration Tests
//!
//! Drive the full service (config -> pipeline -> intake loop) over the
//! in-memory transports.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pretty_assertions::assert_eq;
use tokio::sync::watch;
use tokio::time::timeout;

use mqtt_kafka_bridge::bridge::{
    parse_envelope, BridgePipeline, BridgeService, InboundMessage, QoS, StopReason,
};
use mqtt_kafka_bridge::config::{AckMode, Config};
use mqtt_kafka_bridge::metrics::Metrics;
use mqtt_kafka_bridge::transport::memory::{MemoryInbound, MemoryOutbound};

const CONFIG: &str = r#"
[mqtt]
broker_address = "tcp://localhost:1883"
client_id = "integration"
topics = ["sensors/#", "a/+"]
qos = 1
completion_timeout = 200

[kafka]
broker_address = "localhost:9092"

[bridge]
ack_mode = "after_publish"
"#;

fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

fn build(
    config: &Config,
    outbound: Arc<MemoryOutbound>,
    inbound: MemoryInbound,
    metrics: Arc<Metrics>,
) -> BridgeService<MemoryInbound> {
    let pipeline = BridgePipeline::new(outbound)
        .with_completion_timeout(config.mqtt.completion_timeout_duration())
        .with_payload_encoding(config.bridge.payload_encoding)
        .with_metrics(metrics.clone());
    BridgeService::new(inbound, pipeline, config.bridge.ack_mode).with_metrics(metrics)
}

#[tokio::test]
async fn test_end_to_end_bridge() {
    let config = Config::parse(CONFIG).unwrap();
    assert_eq!(config.bridge.ack_mode, AckMode::AfterPublish);

    let metrics = Arc::new(Metrics::new());
    let outbound = Arc::new(MemoryOutbound::new());
    outbound.fail_topic("a.2");
    outbound.delay_topic("a.3", Duration::from_secs(2));

    let (handle, inbound) = MemoryInbound::channel(config.mqtt.channel_capacity);
    let acks = handle.ack_log();
    let mut service = build(&config, outbound.clone(), inbound, metrics.clone());

    let before = epoch_millis();
    let messages = [
        ("sensors/room1/hum", "42.5", 1),
        ("a/1", "one", 2),
        ("a/2", "two", 3),
        ("a/3", "three", 4),
        ("", "orphan", 5),
        ("a/4", "four", 6),
    ];
    for (topic, payload, id) in messages {
        handle
            .deliver(InboundMessage::new(topic, payload, QoS::AtLeastOnce).with_packet_id(id))
            .await
            .unwrap();
    }
    drop(handle);

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let reason = timeout(Duration::from_secs(5), service.run(shutdown_rx))
        .await
        .unwrap();
    let after = epoch_millis();

    assert_eq!(reason, StopReason::InboundClosed);

    // Every routable message was attempted, in receive order
    assert_eq!(
        outbound.attempted_topics(),
        vec!["sensors.room1.hum", "a.1", "a.2", "a.3", "a.4"]
    );

    let delivered = outbound.delivered();
    assert_eq!(delivered[0].topic, "sensors.room1.hum");
    let envelope = parse_envelope(&delivered[0].payload).unwrap();
    assert_eq!(envelope.payload, "42.5");
    assert!(envelope.timestamp >= before && envelope.timestamp <= after);

    // Failed and timed out publishes keep their ack withheld
    assert_eq!(acks.acked(), vec![1, 2, 5, 6]);
    assert_eq!(metrics.acks_withheld_total.get(), 2);

    let stats = service.stats();
    assert_eq!(stats.failed("a.2"), 1);
    assert_eq!(stats.failed("a.3"), 1);
    assert_eq!(stats.total_succeeded(), 3);
    assert_eq!(stats.dropped("invalid_topic"), 1);
    assert_eq!(outbound.flush_count(), 1);

    assert_eq!(
        metrics
            .publish_failure_total
            .with_label_values(&["a.3", "completion_timeout"])
            .get(),
        1
    );
}

#[tokio::test]
async fn test_backpressure_preserves_order() {
    let config = Config::parse(CONFIG).unwrap();
    let metrics = Arc::new(Metrics::new());
    let outbound = Arc::new(MemoryOutbound::new());

    // Tiny channel: the producer side has to wait for intake
    let (handle, inbound) = MemoryInbound::channel(1);
    let mut service = build(&config, outbound.clone(), inbound, metrics);

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let intake = tokio::spawn(async move {
        service.run(shutdown_rx).await;
        service.stats()
    });

    for i in 0..50u16 {
        handle
            .deliver(
                InboundMessage::new(format!("sensors/{}", i), i.to_string(), QoS::AtLeastOnce)
                    .with_packet_id(i + 1),
            )
            .await
            .unwrap();
    }
    drop(handle);

    let stats = timeout(Duration::from_secs(5), intake).await.unwrap().unwrap();
    assert_eq!(stats.total_succeeded(), 50);

    let expected: Vec<String> = (0..50).map(|i| format!("sensors.{}", i)).collect();
    assert_eq!(outbound.attempted_topics(), expected);
}
