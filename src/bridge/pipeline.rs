//! Bridge Pipeline
//!
//! Moves one inbound message through
//! `RECEIVED -> TOPIC_TRANSLATED -> ENVELOPED -> PUBLISH_SUBMITTED -> {ACKED | FAILED}`.
//! There is no retry transition; retries belong to the outbound transport.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::envelope::{Clock, EnvelopeBuilder, MonotonicClock};
use super::message::{DeliveryOutcome, Disposition, InboundMessage, RoutedMessage};
use super::tracker::DeliveryTracker;
use super::translator::TopicTranslator;
use crate::config::PayloadEncoding;
use crate::error::BridgeError;
use crate::metrics::Metrics;
use crate::transport::OutboundTransport;

/// Default bound on waiting for a publish confirmation
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_millis(5000);

/// Translates, enriches and publishes inbound messages one at a time
pub struct BridgePipeline {
    translator: TopicTranslator,
    envelopes: EnvelopeBuilder,
    outbound: Arc<dyn OutboundTransport>,
    tracker: Arc<DeliveryTracker>,
    custom_tracker: bool,
    clock: Arc<dyn Clock>,
    completion_timeout: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl BridgePipeline {
    /// Pipeline with UTF-8 envelopes, the system clock and a fresh tracker
    pub fn new(outbound: Arc<dyn OutboundTransport>) -> Self {
        Self {
            translator: TopicTranslator::new(),
            envelopes: EnvelopeBuilder::default(),
            outbound,
            tracker: Arc::new(DeliveryTracker::new()),
            custom_tracker: false,
            clock: Arc::new(MonotonicClock::new()),
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
            metrics: None,
        }
    }

    pub fn with_completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = timeout;
        self
    }

    pub fn with_payload_encoding(mut self, encoding: PayloadEncoding) -> Self {
        self.envelopes = EnvelopeBuilder::new(encoding);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a caller-owned tracker. It is kept as is by [`Self::with_metrics`]
    /// in either call order; build it with [`DeliveryTracker::with_metrics`]
    /// to mirror its counts into Prometheus.
    pub fn with_tracker(mut self, tracker: Arc<DeliveryTracker>) -> Self {
        self.tracker = tracker;
        self.custom_tracker = true;
        self
    }

    /// Attach a metrics registry for intake and latency metrics. Unless a
    /// tracker was supplied through [`Self::with_tracker`], the default
    /// tracker is swapped for one that mirrors into the same registry.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        if !self.custom_tracker {
            self.tracker = Arc::new(DeliveryTracker::with_metrics(metrics.clone()));
        }
        self.metrics = Some(metrics);
        self
    }

    pub fn tracker(&self) -> Arc<DeliveryTracker> {
        self.tracker.clone()
    }

    pub fn outbound(&self) -> Arc<dyn OutboundTransport> {
        self.outbound.clone()
    }

    pub fn completion_timeout(&self) -> Duration {
        self.completion_timeout
    }

    /// Derive the destination topic and envelope for a message
    pub fn route(&self, message: &InboundMessage) -> Result<RoutedMessage, BridgeError> {
        let destination_topic = self.translator.translate(&message.source_topic)?;
        let envelope = self
            .envelopes
            .build(&message.payload, self.clock.now_millis())?;
        Ok(RoutedMessage {
            destination_topic,
            envelope,
        })
    }

    /// Bridge a single message and return its terminal state.
    ///
    /// Never returns an error: structural failures are dropped and recorded,
    /// delivery failures are recorded and logged with the payload.
    pub async fn on_message(&self, message: InboundMessage) -> Disposition {
        if let Some(ref m) = self.metrics {
            m.record_received(message.payload.len());
        }

        let routed = match self.route(&message) {
            Ok(routed) => routed,
            Err(e) => {
                warn!(
                    "Bridge: Dropping message from '{}' ({}): {}",
                    message.source_topic,
                    e.kind(),
                    e
                );
                self.tracker.record_dropped(&e);
                return Disposition::Failed(e);
            }
        };

        debug!(
            "Bridge: {} -> {} ({} bytes) via {}",
            message.source_topic,
            routed.destination_topic,
            routed.envelope.len(),
            self.outbound.name()
        );

        let publish = self
            .outbound
            .publish(&routed.destination_topic, routed.envelope);

        let result = match tokio::time::timeout(self.completion_timeout, publish).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(BridgeError::PublishFailure(e.to_string())),
            Err(_) => Err(BridgeError::CompletionTimeout {
                timeout_ms: self.completion_timeout.as_millis() as u64,
            }),
        };

        match result {
            Ok(()) => {
                if let Some(ref m) = self.metrics {
                    m.publish_latency
                        .observe(message.received_at.elapsed().as_secs_f64());
                }
                self.tracker
                    .record(&DeliveryOutcome::delivered(routed.destination_topic.as_str()));
                info!(
                    "Bridge: Published to '{}': {}",
                    routed.destination_topic,
                    String::from_utf8_lossy(&message.payload)
                );
                Disposition::Acked {
                    destination_topic: routed.destination_topic,
                }
            }
            Err(e) => {
                error!(
                    "Bridge: Publish failed {} -> {} ({}): {}; payload: {}",
                    message.source_topic,
                    routed.destination_topic,
                    e.kind(),
                    e,
                    String::from_utf8_lossy(&message.payload)
                );
                self.tracker.record(&DeliveryOutcome::failed(
                    routed.destination_topic,
                    e.clone(),
                ));
                Disposition::Failed(e)
            }
        }
    }
}
