//! In-process transports
//!
//! Channel-fed inbound and recording outbound transports. Used by the test
//! suites and handy for embedding the pipeline without live brokers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{InboundTransport, OutboundTransport, TransportError};
use crate::bridge::InboundMessage;

/// Inbound transport fed through a bounded channel
pub struct MemoryInbound {
    rx: mpsc::Receiver<InboundMessage>,
    acks: Arc<Mutex<Vec<u16>>>,
}

/// Producer half of [`MemoryInbound`]
#[derive(Clone)]
pub struct MemoryInboundHandle {
    tx: mpsc::Sender<InboundMessage>,
    acks: Arc<Mutex<Vec<u16>>>,
}

impl MemoryInbound {
    /// Create an inbound transport and the handle used to deliver messages to it
    pub fn channel(capacity: usize) -> (MemoryInboundHandle, MemoryInbound) {
        let (tx, rx) = mpsc::channel(capacity);
        let acks = Arc::new(Mutex::new(Vec::new()));
        (
            MemoryInboundHandle {
                tx,
                acks: acks.clone(),
            },
            MemoryInbound { rx, acks },
        )
    }
}

impl MemoryInboundHandle {
    /// Deliver a message, waiting while the channel is full
    pub async fn deliver(&self, message: InboundMessage) -> Result<(), TransportError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Packet ids acknowledged so far, in acknowledgment order
    pub fn acked(&self) -> Vec<u16> {
        self.acks.lock().clone()
    }

    /// Read-only view of the acknowledgments that does not keep the channel open
    pub fn ack_log(&self) -> AckLog {
        AckLog(self.acks.clone())
    }
}

/// Acknowledgments recorded by a [`MemoryInbound`]
#[derive(Clone)]
pub struct AckLog(Arc<Mutex<Vec<u16>>>);

impl AckLog {
    pub fn acked(&self) -> Vec<u16> {
        self.0.lock().clone()
    }
}

#[async_trait]
impl InboundTransport for MemoryInbound {
    async fn recv(&mut self) -> Option<InboundMessage> {
        self.rx.recv().await
    }

    async fn ack(&mut self, message: &InboundMessage) -> Result<(), TransportError> {
        if message.qos.requires_ack() {
            self.acks.lock().push(message.packet_id);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.rx.close();
        Ok(())
    }
}

/// Publish recorded by [`MemoryOutbound`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPublish {
    pub topic: String,
    pub payload: Bytes,
}

#[derive(Default)]
struct Script {
    failing_topics: HashSet<String>,
    fail_next: usize,
    delays: HashMap<String, Duration>,
}

/// Outbound transport that records every publish attempt.
///
/// Failures and slow completions can be scripted per topic.
#[derive(Default)]
pub struct MemoryOutbound {
    attempts: Mutex<Vec<RecordedPublish>>,
    delivered: Mutex<Vec<RecordedPublish>>,
    script: Mutex<Script>,
    flushes: Mutex<usize>,
}

impl MemoryOutbound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every publish to `topic` fails
    pub fn fail_topic(&self, topic: &str) {
        self.script.lock().failing_topics.insert(topic.to_string());
    }

    /// The next `count` publishes fail regardless of topic
    pub fn fail_next(&self, count: usize) {
        self.script.lock().fail_next = count;
    }

    /// Publishes to `topic` take `delay` to complete
    pub fn delay_topic(&self, topic: &str, delay: Duration) {
        self.script.lock().delays.insert(topic.to_string(), delay);
    }

    /// All publish attempts in submission order
    pub fn attempts(&self) -> Vec<RecordedPublish> {
        self.attempts.lock().clone()
    }

    /// Publishes that completed successfully, in completion order
    pub fn delivered(&self) -> Vec<RecordedPublish> {
        self.delivered.lock().clone()
    }

    /// Destination topics of all attempts, in submission order
    pub fn attempted_topics(&self) -> Vec<String> {
        self.attempts.lock().iter().map(|p| p.topic.clone()).collect()
    }

    pub fn flush_count(&self) -> usize {
        *self.flushes.lock()
    }
}

#[async_trait]
impl OutboundTransport for MemoryOutbound {
    fn name(&self) -> &str {
        "memory"
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        let record = RecordedPublish {
            topic: topic.to_string(),
            payload,
        };
        self.attempts.lock().push(record.clone());

        let (fail, delay) = {
            let mut script = self.script.lock();
            let fail = if script.fail_next > 0 {
                script.fail_next -= 1;
                true
            } else {
                script.failing_topics.contains(topic)
            };
            (fail, script.delays.get(topic).copied())
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if fail {
            return Err(TransportError::Rejected(format!(
                "scripted failure for '{}'",
                topic
            )));
        }

        self.delivered.lock().push(record);
        Ok(())
    }

    async fn flush(&self) -> Result<(), TransportError> {
        *self.flushes.lock() += 1;
        Ok(())
    }
}
