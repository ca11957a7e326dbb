//! mqtt-kafka-bridge - MQTT to Kafka bridge
//!
//! Usage:
//!   mqtt-kafka-bridge [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>          Configuration file path
//!   -m, --mqtt-broker <ADDR>     MQTT broker address (tcp://host:port)
//!   -k, --kafka-broker <ADDRS>   Kafka bootstrap servers (comma separated)
//!   -l, --log-level              Log level (error, warn, info, debug, trace)
//!   -h, --help                   Print help

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use mqtt_kafka_bridge::bridge::{BridgePipeline, BridgeService};
use mqtt_kafka_bridge::config::Config;
use mqtt_kafka_bridge::error::BridgeError;
use mqtt_kafka_bridge::metrics::{Metrics, MetricsServer};
use mqtt_kafka_bridge::transport::{KafkaOutbound, MqttInbound};

/// Default configuration file looked up when `--config` is absent
const DEFAULT_CONFIG_PATH: &str = "bridge.toml";

/// Log level for CLI
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Trace messages (very verbose)
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Bridge that republishes MQTT messages to Kafka
#[derive(Parser, Debug)]
#[command(name = "mqtt-kafka-bridge")]
#[command(version)]
#[command(about = "Republishes MQTT messages to Kafka topics")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// MQTT broker address, overrides mqtt.broker_address
    #[arg(short, long)]
    mqtt_broker: Option<String>,

    /// Kafka bootstrap servers, overrides kafka.broker_address
    #[arg(short, long)]
    kafka_broker: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,
}

/// CLI flag, then RUST_LOG, then the config file
fn log_filter(args: &Args, config: &Config) -> EnvFilter {
    if let Some(level) = args.log_level {
        return EnvFilter::new(level.as_filter());
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level))
}

/// Wait for Ctrl+C and flip the shutdown flag
async fn shutdown_signal(tx: watch::Sender<bool>) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
    }
    let _ = tx.send(true);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut config = match Config::read(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config file: {}", e);
            std::process::exit(1);
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(&args, &config))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // CLI args override file config
    if let Some(broker) = args.mqtt_broker {
        config.mqtt.broker_address = broker;
    }
    if let Some(brokers) = args.kafka_broker {
        config.kafka.broker_address = brokers;
    }

    if let Err(e) = config.validate() {
        error!("{}", BridgeError::from(e));
        std::process::exit(1);
    }

    info!("Starting MQTT to Kafka bridge");
    info!("  Config: {:?}", config_path);
    info!("  MQTT broker: {}", config.mqtt.broker_address);
    info!("  MQTT topics: {}", config.mqtt.topics.join(", "));
    info!("  MQTT QoS: {}", config.mqtt.qos);
    info!("  Kafka brokers: {}", config.kafka.broker_address);
    info!("  Payload encoding: {:?}", config.bridge.payload_encoding);
    info!("  Ack mode: {:?}", config.bridge.ack_mode);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics = Arc::new(Metrics::new());
    if config.metrics.enabled {
        info!("  Metrics: enabled (http://{})", config.metrics.bind);
        let metrics_server = MetricsServer::new(metrics.clone(), config.metrics.bind);
        let server_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics_server.run(server_shutdown).await {
                error!("Metrics server error: {}", e);
            }
        });
    } else {
        info!("  Metrics: disabled");
    }

    let outbound = match KafkaOutbound::new(&config.kafka) {
        Ok(outbound) => Arc::new(outbound),
        Err(e) => {
            error!("{}", BridgeError::from(e));
            std::process::exit(1);
        }
    };

    let inbound = match MqttInbound::connect(&config.mqtt, &config.bridge, Some(metrics.clone())) {
        Ok(inbound) => inbound,
        Err(e) => {
            error!("{}", BridgeError::from(e));
            std::process::exit(1);
        }
    };

    let pipeline = BridgePipeline::new(outbound)
        .with_completion_timeout(config.mqtt.completion_timeout_duration())
        .with_payload_encoding(config.bridge.payload_encoding)
        .with_metrics(metrics.clone());

    let mut service =
        BridgeService::new(inbound, pipeline, config.bridge.ack_mode).with_metrics(metrics);

    tokio::spawn(shutdown_signal(shutdown_tx));

    service.run(shutdown_rx).await;

    Ok(())
}
