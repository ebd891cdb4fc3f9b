use anyhow::Context;
use axum::{http::StatusCode, routing::get, Router};
use clap::Parser;
use smartfarm::config::{Config, StoreBackend};
use smartfarm::publisher::{spawn_publisher, MqttSink};
use smartfarm::{db, metrics, mqtt, rest, subscriber, MemoryStore, QueryService, SharedStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    smartfarm::logging::init();

    info!("Starting SmartFarm server");
    info!(
        "MQTT broker: {}:{}, topic: {}",
        config.mqtt_broker, config.mqtt_port, config.mqtt_topic
    );
    info!("HTTP server: {}", config.http_addr);

    metrics::init_metrics().context("failed to register metrics")?;

    let store: SharedStore = match config.store {
        StoreBackend::Postgres => {
            info!("Database: {}", config.redacted_database_url());
            let pool = db::make_pool(&config.database_url, config.db_max_connections)
                .await
                .context("failed to connect to database")?;
            Arc::new(db::PgStore::new(pool))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store, data will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let qos = mqtt::qos_from_level(config.mqtt_qos)?;
    let client_id = format!("smartfarm-{}", uuid::Uuid::new_v4());
    let (client, eventloop) = mqtt::connect(&config.mqtt_broker, config.mqtt_port, client_id);
    let connection = mqtt::ConnectionState::new();

    info!("Channel capacity: {}", config.channel_capacity);
    let (tx, rx) = mpsc::channel(config.channel_capacity);

    let publisher_handle = if config.no_publisher {
        info!("In-process publisher disabled");
        None
    } else {
        Some(spawn_publisher(
            MqttSink::new(client.clone(), qos, connection.clone()),
            config.mqtt_topic.clone(),
            config.publish_interval(),
        ))
    };

    let topic = config.mqtt_topic.clone();
    let mqtt_handle = tokio::spawn(async move {
        if let Err(e) = mqtt::run_mqtt(client, eventloop, topic, qos, connection, tx).await {
            error!("MQTT task failed: {}", e);
        }
    });

    let subscriber_store = store.clone();
    let subscriber_handle = tokio::spawn(async move {
        subscriber::run_subscriber(rx, subscriber_store).await;
    });

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(QueryService::new(store)));

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.http_addr))?;

    info!("HTTP server listening on {}", config.http_addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    });

    let publisher_done = async {
        match publisher_handle {
            Some(handle) => handle.await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = publisher_done => {
            error!("Publisher task terminated");
        }
        _ = mqtt_handle => {
            error!("MQTT task terminated");
        }
        _ = subscriber_handle => {
            error!("Subscriber task terminated");
        }
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
    Ok(())
}

async fn metrics_handler() -> Result<String, StatusCode> {
    metrics::gather_metrics().map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
