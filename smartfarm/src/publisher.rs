//! Simulated soil moisture sensor.
//!
//! Emits one random reading per interval on the telemetry topic. Emission is
//! fire-and-forget: when the channel cannot take the message the tick is
//! dropped and the next tick proceeds as usual.

use crate::errors::{Error, Result};
use crate::metrics::{PUBLISHED_TOTAL, PUBLISH_DROPPED_TOTAL};
use crate::mqtt::ConnectionState;
use crate::validate::{MOISTURE_MAX, MOISTURE_MIN};
use async_trait::async_trait;
use rand::Rng;
use rumqttc::{AsyncClient, QoS};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default time between two simulated readings, in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(DEFAULT_INTERVAL_MS);

/// Destination for published payloads
#[async_trait]
pub trait Sink: Send + Sync {
    async fn emit(&self, topic: &str, payload: String) -> Result<()>;
}

/// MQTT sink. Emits are refused while the connection is down, so ticks are
/// dropped instead of piling up in the client's request queue; `try_publish`
/// never waits on the event loop, so a full queue also drops the tick.
pub struct MqttSink {
    client: AsyncClient,
    qos: QoS,
    state: ConnectionState,
}

impl MqttSink {
    pub fn new(client: AsyncClient, qos: QoS, state: ConnectionState) -> Self {
        Self { client, qos, state }
    }
}

#[async_trait]
impl Sink for MqttSink {
    async fn emit(&self, topic: &str, payload: String) -> Result<()> {
        if !self.state.is_connected() {
            return Err(Error::Disconnected);
        }
        self.client
            .try_publish(topic, self.qos, false, payload)
            .map_err(Error::Mqtt)
    }
}

/// Generates a moisture value uniformly distributed in [0, 100)
pub fn generate_moisture(rng: &mut impl Rng) -> f64 {
    rng.gen_range(MOISTURE_MIN..MOISTURE_MAX)
}

/// Starts the publisher on its own task. The returned handle is meant to be
/// held for the lifetime of the process.
pub fn spawn_publisher<S>(sink: S, topic: String, period: Duration) -> JoinHandle<()>
where
    S: Sink + 'static,
{
    tokio::spawn(async move { run_publisher(sink, topic, period).await })
}

pub async fn run_publisher<S: Sink>(sink: S, topic: String, period: Duration) {
    info!("Publishing simulated readings on {} every {:?}", topic, period);

    // first reading one full period after start
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let value = generate_moisture(&mut rand::thread_rng());
        match sink.emit(&topic, value.to_string()).await {
            Ok(()) => {
                PUBLISHED_TOTAL.inc();
                debug!("Published moisture {:.2} to {}", value, topic);
            }
            Err(e) => {
                PUBLISH_DROPPED_TOTAL.inc();
                warn!("Dropping simulated reading {:.2}: {}", value, e);
            }
        }
    }
}
