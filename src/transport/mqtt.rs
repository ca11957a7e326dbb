//! MQTT Inbound Transport
//!
//! Connects to the source broker with `rumqttc`, subscribes to the configured
//! topic filters and forwards every PUBLISH into a bounded channel drained by
//! the bridge intake task. A full channel stalls the event loop, which in turn
//! stops reading from the broker.
//!
//! Subscriptions are re-issued on every CONNACK so a reconnect with a clean
//! session resumes intake.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, Publish,
    QoS as RumqttQoS, SubscribeFilter, SubscribeReasonCode,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{InboundTransport, TransportError};
use crate::bridge::{InboundMessage, QoS};
use crate::config::{BridgeSettings, MqttConfig, MqttScheme};
use crate::metrics::Metrics;

/// Initial delay before polling again after a connection error
const RECONNECT_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound for the reconnect delay
const MAX_RECONNECT_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum MQTT packet size accepted from the broker
const MAX_PACKET_SIZE: usize = 1024 * 1024;

/// Upper bound on packets rumqttc hands out from one socket read before it
/// drains queued requests again
const MAX_READ_BATCH: usize = 10;

/// Request queue slots beyond the ack budget (subscribe, disconnect)
const REQUEST_HEADROOM: usize = 6;

/// Capacity of the rumqttc request queue.
///
/// Acks are queued by the intake task while the event loop may be blocked
/// handing buffered packets to the intake channel. Every delivery that can be
/// outstanding at that point (intake channel, one read batch, the message in
/// the pipeline) needs its own slot, or both sides wait on each other.
pub fn request_capacity(channel_capacity: usize) -> usize {
    channel_capacity * 2 + MAX_READ_BATCH + REQUEST_HEADROOM
}

fn to_rumqtt_qos(qos: QoS) -> RumqttQoS {
    match qos {
        QoS::AtMostOnce => RumqttQoS::AtMostOnce,
        QoS::AtLeastOnce => RumqttQoS::AtLeastOnce,
        QoS::ExactlyOnce => RumqttQoS::ExactlyOnce,
    }
}

fn from_rumqtt_qos(qos: RumqttQoS) -> QoS {
    match qos {
        RumqttQoS::AtMostOnce => QoS::AtMostOnce,
        RumqttQoS::AtLeastOnce => QoS::AtLeastOnce,
        RumqttQoS::ExactlyOnce => QoS::ExactlyOnce,
    }
}

/// Build client options from the MQTT section
pub fn mqtt_options(
    config: &MqttConfig,
    settings: &BridgeSettings,
) -> Result<MqttOptions, TransportError> {
    let (scheme, host, port) = config
        .parse_address()
        .map_err(|e| TransportError::InvalidConfig(e.to_string()))?;

    let mut options = MqttOptions::new(config.client_id.clone(), host, port);
    options.set_keep_alive(config.keep_alive_duration());
    options.set_clean_session(config.clean_session);
    options.set_manual_acks(settings.manual_acks());
    options.set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);

    if let Some((username, password)) = config.credentials() {
        options.set_credentials(username, password);
    }

    if scheme == MqttScheme::Tls {
        options.set_transport(rumqttc::Transport::Tls(Default::default()));
    }

    Ok(options)
}

/// Inbound transport backed by an MQTT subscription
pub struct MqttInbound {
    client: AsyncClient,
    rx: mpsc::Receiver<InboundMessage>,
    manual_acks: bool,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl MqttInbound {
    /// Create the client and spawn its event loop. Must be called within a
    /// Tokio runtime. The connection is established by the event loop.
    pub fn connect(
        config: &MqttConfig,
        settings: &BridgeSettings,
        metrics: Option<Arc<Metrics>>,
    ) -> Result<Self, TransportError> {
        let options = mqtt_options(config, settings)?;
        let (client, eventloop) = AsyncClient::new(options, request_capacity(config.channel_capacity));
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let filters: Vec<SubscribeFilter> = config
            .topics
            .iter()
            .map(|topic| SubscribeFilter::new(topic.clone(), to_rumqtt_qos(config.subscription_qos())))
            .collect();

        info!(
            "MQTT: Connecting to {} as '{}' ({} topic filters, qos={})",
            config.broker_address,
            config.client_id,
            filters.len(),
            config.qos
        );

        let task = tokio::spawn(event_loop(
            eventloop,
            client.clone(),
            filters,
            tx,
            metrics,
            shutdown_rx,
        ));

        Ok(Self {
            client,
            rx,
            manual_acks: settings.manual_acks(),
            shutdown_tx,
            task: Some(task),
        })
    }
}

/// Drive the MQTT connection until shutdown or until the intake side is gone
async fn event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    filters: Vec<SubscribeFilter>,
    tx: mpsc::Sender<InboundMessage>,
    metrics: Option<Arc<Metrics>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut retry_interval = RECONNECT_INTERVAL;

    loop {
        let event = tokio::select! {
            event = eventloop.poll() => event,
            _ = shutdown.changed() => {
                debug!("MQTT: Event loop shutdown requested");
                break;
            }
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                if connack.code != ConnectReturnCode::Success {
                    error!("MQTT: Connection refused: {:?}", connack.code);
                    continue;
                }
                info!(
                    "MQTT: Connected (session_present={})",
                    connack.session_present
                );
                retry_interval = RECONNECT_INTERVAL;
                if let Some(ref m) = metrics {
                    m.set_inbound_connected(true);
                }

                // try_ variant: the request queue is drained by this very loop
                if let Err(e) = client.try_subscribe_many(filters.clone()) {
                    error!("MQTT: Failed to queue subscriptions: {}", e);
                }
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                let refused = suback
                    .return_codes
                    .iter()
                    .filter(|code| matches!(code, SubscribeReasonCode::Failure))
                    .count();
                if refused > 0 {
                    warn!("MQTT: Broker refused {} subscription(s)", refused);
                } else {
                    debug!("MQTT: SUBACK received");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = InboundMessage {
                    source_topic: publish.topic,
                    payload: publish.payload,
                    qos: from_rumqtt_qos(publish.qos),
                    packet_id: publish.pkid,
                    received_at: Instant::now(),
                };
                if tx.send(message).await.is_err() {
                    debug!("MQTT: Intake closed, stopping event loop");
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("MQTT: Broker sent DISCONNECT");
                if let Some(ref m) = metrics {
                    m.set_inbound_connected(false);
                }
            }
            Ok(_) => {}
            Err(e) => {
                if *shutdown.borrow() {
                    break;
                }
                error!("MQTT: Connection error: {}", e);
                if let Some(ref m) = metrics {
                    m.set_inbound_connected(false);
                }
                debug!("MQTT: Reconnecting in {:?}", retry_interval);

                tokio::select! {
                    _ = tokio::time::sleep(retry_interval) => {}
                    _ = shutdown.changed() => break,
                }
                retry_interval = std::cmp::min(retry_interval * 2, MAX_RECONNECT_INTERVAL);
            }
        }
    }

    if let Some(ref m) = metrics {
        m.set_inbound_connected(false);
    }
}

#[async_trait]
impl InboundTransport for MqttInbound {
    async fn recv(&mut self) -> Option<InboundMessage> {
        self.rx.recv().await
    }

    async fn ack(&mut self, message: &InboundMessage) -> Result<(), TransportError> {
        if !self.manual_acks || !message.qos.requires_ack() {
            return Ok(());
        }

        let mut publish = Publish::new(
            message.source_topic.clone(),
            to_rumqtt_qos(message.qos),
            Vec::new(),
        );
        publish.pkid = message.packet_id;

        self.client
            .ack(&publish)
            .await
            .map_err(|e| TransportError::ConnectionLost(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.rx.close();

        if let Err(e) = self.client.disconnect().await {
            debug!("MQTT: Disconnect request failed: {}", e);
        }

        // Let the event loop flush the DISCONNECT before stopping it
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(Duration::from_secs(1), &mut task)
                .await
                .is_err()
            {
                let _ = self.shutdown_tx.send(true);
                let _ = task.await;
            }
        }

        info!("MQTT: Disconnected");
        Ok(())
    }
}

impl Drop for MqttInbound {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
