use clap::Parser;
use smartfarm::mqtt::{self, qos_from_level, ConnectionState};
use smartfarm::publisher::{spawn_publisher, MqttSink, DEFAULT_INTERVAL_MS};
use std::time::Duration;
use tracing::{error, info};

/// Standalone soil moisture sensor simulator
#[derive(Debug, Parser)]
#[command(name = "simulator", version, about)]
struct Args {
    #[arg(long, env = "MQTT_BROKER", default_value = "localhost")]
    mqtt_broker: String,

    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    mqtt_port: u16,

    #[arg(
        long,
        env = "MQTT_QOS",
        default_value_t = 0,
        value_parser = clap::value_parser!(u8).range(0..=2)
    )]
    mqtt_qos: u8,

    #[arg(long, env = "MQTT_TOPIC", default_value = "smartfarm/moisture")]
    mqtt_topic: String,

    #[arg(long, env = "PUBLISH_INTERVAL_MS", default_value_t = DEFAULT_INTERVAL_MS)]
    publish_interval_ms: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    smartfarm::logging::init();

    info!("Starting soil moisture simulator");
    info!(
        "Broker: {}:{}, topic: {}, interval: {} ms",
        args.mqtt_broker, args.mqtt_port, args.mqtt_topic, args.publish_interval_ms
    );

    let qos = match qos_from_level(args.mqtt_qos) {
        Ok(qos) => qos,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    let client_id = format!("sim-{}", uuid::Uuid::new_v4());
    let (client, eventloop) = mqtt::connect(&args.mqtt_broker, args.mqtt_port, client_id);
    let connection = ConnectionState::new();

    tokio::spawn(mqtt::run_eventloop(eventloop, connection.clone()));

    let publisher = spawn_publisher(
        MqttSink::new(client, qos, connection),
        args.mqtt_topic,
        Duration::from_millis(args.publish_interval_ms),
    );

    tokio::select! {
        _ = publisher => {
            error!("Publisher task terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }
}
