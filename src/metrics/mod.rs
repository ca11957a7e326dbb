//! Prometheus metrics for the bridge
//!
//! Exposes metrics at /metrics endpoint for monitoring and observability.

use std::sync::atomic::{AtomicBool, Ordering};

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

mod server;

pub use server::MetricsServer;

/// All bridge metrics in one place
pub struct Metrics {
    pub registry: Registry,

    // Intake
    pub messages_received_total: IntCounter,
    pub messages_received_bytes: IntCounter,

    // Outcomes
    pub publish_success_total: IntCounterVec,
    pub publish_failure_total: IntCounterVec,
    pub messages_dropped_total: IntCounterVec,

    // Inbound acknowledgments withheld after a failed publish
    pub acks_withheld_total: IntCounter,

    // Connection state
    pub inbound_connected: IntGauge,

    // Performance
    pub publish_latency: Histogram,

    ready: AtomicBool,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let messages_received_total = IntCounter::with_opts(Opts::new(
            "bridge_messages_received_total",
            "Total MQTT messages handed to the pipeline",
        ))
        .unwrap();

        let messages_received_bytes = IntCounter::with_opts(Opts::new(
            "bridge_messages_received_bytes_total",
            "Total MQTT payload bytes handed to the pipeline",
        ))
        .unwrap();

        let publish_success_total = IntCounterVec::new(
            Opts::new(
                "bridge_publish_success_total",
                "Kafka publishes confirmed, by destination topic",
            ),
            &["topic"],
        )
        .unwrap();

        let publish_failure_total = IntCounterVec::new(
            Opts::new(
                "bridge_publish_failure_total",
                "Kafka publishes failed or timed out, by destination topic and error kind",
            ),
            &["topic", "kind"],
        )
        .unwrap();

        let messages_dropped_total = IntCounterVec::new(
            Opts::new(
                "bridge_messages_dropped_total",
                "Messages discarded before publishing, by error kind",
            ),
            &["kind"],
        )
        .unwrap();

        let acks_withheld_total = IntCounter::with_opts(Opts::new(
            "bridge_acks_withheld_total",
            "Inbound deliveries left unacknowledged after a failed publish",
        ))
        .unwrap();

        let inbound_connected = IntGauge::with_opts(Opts::new(
            "bridge_inbound_connected",
            "1 while the MQTT connection is established",
        ))
        .unwrap();

        let publish_latency = Histogram::with_opts(
            HistogramOpts::new(
                "bridge_publish_latency_seconds",
                "Time from MQTT receipt to Kafka publish confirmation",
            )
            .buckets(vec![
                0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )
        .unwrap();

        registry
            .register(Box::new(messages_received_total.clone()))
            .unwrap();
        registry
            .register(Box::new(messages_received_bytes.clone()))
            .unwrap();
        registry
            .register(Box::new(publish_success_total.clone()))
            .unwrap();
        registry
            .register(Box::new(publish_failure_total.clone()))
            .unwrap();
        registry
            .register(Box::new(messages_dropped_total.clone()))
            .unwrap();
        registry
            .register(Box::new(acks_withheld_total.clone()))
            .unwrap();
        registry
            .register(Box::new(inbound_connected.clone()))
            .unwrap();
        registry
            .register(Box::new(publish_latency.clone()))
            .unwrap();

        Metrics {
            registry,
            messages_received_total,
            messages_received_bytes,
            publish_success_total,
            publish_failure_total,
            messages_dropped_total,
            acks_withheld_total,
            inbound_connected,
            publish_latency,
            ready: AtomicBool::new(false),
        }
    }

    /// Record a message entering the pipeline
    pub fn record_received(&self, payload_len: usize) {
        self.messages_received_total.inc();
        self.messages_received_bytes.inc_by(payload_len as u64);
    }

    /// Update inbound connection state; the first connection marks the bridge ready
    pub fn set_inbound_connected(&self, connected: bool) {
        self.inbound_connected.set(i64::from(connected));
        if connected {
            self.ready.store(true, Ordering::Release);
        }
    }

    /// Whether the bridge has connected to the MQTT broker at least once
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
