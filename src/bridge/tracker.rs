//! Delivery Tracking
//!
//! Counts publish outcomes per destination topic and structural drops per
//! error kind. Counters are lock-free and can be read by tests without
//! looking at log output. When a metrics registry is attached every count is
//! mirrored into Prometheus.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::message::DeliveryOutcome;
use crate::error::BridgeError;
use crate::metrics::Metrics;

#[derive(Debug, Default)]
struct TopicCounters {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time counts for one destination topic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicStats {
    pub succeeded: u64,
    pub failed: u64,
}

/// Observes delivery outcomes without blocking intake
#[derive(Default)]
pub struct DeliveryTracker {
    topics: DashMap<String, TopicCounters>,
    dropped: DashMap<&'static str, AtomicU64>,
    metrics: Option<Arc<Metrics>>,
}

impl DeliveryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker that also feeds the given metrics registry
    pub fn with_metrics(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::default()
        }
    }

    /// Record the outcome of one publish attempt. Never fails.
    pub fn record(&self, outcome: &DeliveryOutcome) {
        let counters = self
            .topics
            .entry(outcome.destination_topic.clone())
            .or_default();

        if outcome.success {
            counters.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
        drop(counters);

        if let Some(ref metrics) = self.metrics {
            if outcome.success {
                metrics
                    .publish_success_total
                    .with_label_values(&[outcome.destination_topic.as_str()])
                    .inc();
            } else {
                let kind = outcome
                    .error
                    .as_ref()
                    .map(BridgeError::kind)
                    .unwrap_or("unknown");
                metrics
                    .publish_failure_total
                    .with_label_values(&[outcome.destination_topic.as_str(), kind])
                    .inc();
            }
        }
    }

    /// Record a message discarded before any publish attempt
    pub fn record_dropped(&self, error: &BridgeError) {
        let kind = error.kind();
        self.dropped
            .entry(kind)
            .or_default()
            .fetch_add(1, Ordering::Relaxed);

        if let Some(ref metrics) = self.metrics {
            metrics.messages_dropped_total.with_label_values(&[kind]).inc();
        }
        debug!("Delivery tracker: dropped message ({})", kind);
    }

    /// Successful publishes to a destination topic
    pub fn succeeded(&self, destination_topic: &str) -> u64 {
        self.topic_stats(destination_topic).succeeded
    }

    /// Failed publishes to a destination topic
    pub fn failed(&self, destination_topic: &str) -> u64 {
        self.topic_stats(destination_topic).failed
    }

    /// Messages dropped with the given error kind (see [`BridgeError::kind`])
    pub fn dropped(&self, kind: &str) -> u64 {
        self.dropped
            .get(kind)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Counts for one destination topic
    pub fn topic_stats(&self, destination_topic: &str) -> TopicStats {
        self.topics
            .get(destination_topic)
            .map(|c| TopicStats {
                succeeded: c.succeeded.load(Ordering::Relaxed),
                failed: c.failed.load(Ordering::Relaxed),
            })
            .unwrap_or_default()
    }

    /// Counts for every destination topic seen so far, sorted by topic
    pub fn snapshot(&self) -> BTreeMap<String, TopicStats> {
        self.topics
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    TopicStats {
                        succeeded: entry.succeeded.load(Ordering::Relaxed),
                        failed: entry.failed.load(Ordering::Relaxed),
                    },
                )
            })
            .collect()
    }

    /// Total successful publishes across all topics
    pub fn total_succeeded(&self) -> u64 {
        self.topics
            .iter()
            .map(|c| c.succeeded.load(Ordering::Relaxed))
            .sum()
    }

    /// Total failed publishes across all topics
    pub fn total_failed(&self) -> u64 {
        self.topics
            .iter()
            .map(|c| c.failed.load(Ordering::Relaxed))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_per_topic() {
        let tracker = DeliveryTracker::new();
        tracker.record(&DeliveryOutcome::delivered("a.1"));
        tracker.record(&DeliveryOutcome::delivered("a.1"));
        tracker.record(&DeliveryOutcome::failed(
            "a.1",
            BridgeError::PublishFailure("broker unavailable".to_string()),
        ));
        tracker.record(&DeliveryOutcome::delivered("a.2"));

        assert_eq!(tracker.succeeded("a.1"), 2);
        assert_eq!(tracker.failed("a.1"), 1);
        assert_eq!(tracker.succeeded("a.2"), 1);
        assert_eq!(tracker.failed("a.2"), 0);
        assert_eq!(tracker.topic_stats("unknown"), TopicStats::default());
        assert_eq!(tracker.total_succeeded(), 3);
        assert_eq!(tracker.total_failed(), 1);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["a.1", "a.2"]);
    }

    #[test]
    fn test_drops_by_kind() {
        let tracker = DeliveryTracker::new();
        tracker.record_dropped(&BridgeError::InvalidTopic {
            topic: String::new(),
            reason: "topic name cannot be empty",
        });
        tracker.record_dropped(&BridgeError::Serialization("bad".to_string()));
        tracker.record_dropped(&BridgeError::Serialization("bad".to_string()));

        assert_eq!(tracker.dropped("invalid_topic"), 1);
        assert_eq!(tracker.dropped("serialization"), 2);
        assert_eq!(tracker.dropped("publish_failure"), 0);
        assert!(tracker.snapshot().is_empty());
    }

    #[test]
    fn test_mirrors_into_metrics() {
        let metrics = Arc::new(Metrics::new());
        let tracker = DeliveryTracker::with_metrics(metrics.clone());

        tracker.record(&DeliveryOutcome::delivered("plant.line1"));
        tracker.record(&DeliveryOutcome::failed(
            "plant.line1",
            BridgeError::CompletionTimeout { timeout_ms: 100 },
        ));
        tracker.record_dropped(&BridgeError::Serialization("bad".to_string()));

        assert_eq!(
            metrics
                .publish_success_total
                .with_label_values(&["plant.line1"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .publish_failure_total
                .with_label_values(&["plant.line1", "completion_timeout"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .messages_dropped_total
                .with_label_values(&["serialization"])
                .get(),
            1
        );
    }

    #[test]
    fn test_concurrent_increments() {
        let tracker = Arc::new(DeliveryTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        tracker.record(&DeliveryOutcome::delivered("shared.topic"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.succeeded("shared.topic"), 8000);
    }
}
