//! Bridge Service
//!
//! Owns the inbound transport and drives the intake loop: receive, hand the
//! message to the pipeline, then decide on the inbound acknowledgment.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::message::{Disposition, InboundMessage};
use super::pipeline::BridgePipeline;
use super::tracker::DeliveryTracker;
use crate::config::AckMode;
use crate::metrics::Metrics;
use crate::transport::InboundTransport;

/// Why the intake loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Inbound transport ended its stream
    InboundClosed,
    /// Shutdown was signalled
    Shutdown,
}

/// Sequential intake loop over one inbound connection
pub struct BridgeService<I: InboundTransport> {
    inbound: I,
    pipeline: BridgePipeline,
    ack_mode: AckMode,
    metrics: Option<Arc<Metrics>>,
}

impl<I: InboundTransport> BridgeService<I> {
    pub fn new(inbound: I, pipeline: BridgePipeline, ack_mode: AckMode) -> Self {
        Self {
            inbound,
            pipeline,
            ack_mode,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Delivery counters shared with the pipeline
    pub fn stats(&self) -> Arc<DeliveryTracker> {
        self.pipeline.tracker()
    }

    pub fn pipeline(&self) -> &BridgePipeline {
        &self.pipeline
    }

    /// Process messages until the inbound stream ends or `shutdown` flips to true,
    /// then disconnect the inbound side and flush the outbound side.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> StopReason {
        info!("Bridge: Intake started (ack_mode={:?})", self.ack_mode);

        let reason = loop {
            if *shutdown.borrow() {
                break StopReason::Shutdown;
            }

            let message = tokio::select! {
                message = self.inbound.recv() => message,
                _ = shutdown.changed() => break StopReason::Shutdown,
            };

            let Some(message) = message else {
                break StopReason::InboundClosed;
            };

            // A publish in flight is allowed to complete before shutdown is observed
            let disposition = self.pipeline.on_message(message.clone()).await;
            self.acknowledge(&message, &disposition).await;
        };

        info!("Bridge: Intake stopped ({:?})", reason);
        self.shutdown().await;
        reason
    }

    async fn acknowledge(&mut self, message: &InboundMessage, disposition: &Disposition) {
        let ack = match self.ack_mode {
            AckMode::OnReceive => true,
            AckMode::AfterPublish => match disposition {
                Disposition::Acked { .. } => true,
                Disposition::Failed(e) => e.is_structural(),
            },
        };

        if !ack {
            if message.qos.requires_ack() {
                debug!(
                    "Bridge: Withholding ack for '{}' (packet {})",
                    message.source_topic, message.packet_id
                );
                if let Some(ref m) = self.metrics {
                    m.acks_withheld_total.inc();
                }
            }
            return;
        }

        if let Err(e) = self.inbound.ack(message).await {
            warn!(
                "Bridge: Failed to ack '{}' (packet {}): {}",
                message.source_topic, message.packet_id, e
            );
        }
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.inbound.close().await {
            warn!("Bridge: Inbound close failed: {}", e);
        }

        let outbound = self.pipeline.outbound();
        let timeout = self.pipeline.completion_timeout();
        match tokio::time::timeout(timeout, outbound.flush()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Bridge: Outbound flush failed: {}", e),
            Err(_) => error!("Bridge: Outbound flush timed out after {:?}", timeout),
        }

        let stats = self.stats();
        info!(
            "Bridge: Stopped ({} delivered, {} failed)",
            stats.total_succeeded(),
            stats.total_failed()
        );
    }
}
