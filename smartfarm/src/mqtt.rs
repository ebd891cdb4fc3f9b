use crate::errors::{Error, Result};
use crate::metrics::{CHANNEL_FULL_TOTAL, MESSAGES_TOTAL};
use crate::model::ChannelMessage;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

/// Capacity of the client's outgoing request queue
const REQUEST_CAPACITY: usize = 64;

pub fn qos_from_level(level: u8) -> Result<QoS> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(Error::Validation(format!("invalid MQTT QoS level {}", other))),
    }
}

/// Whether the broker connection is currently up. Set on ConnAck, cleared
/// whenever polling the event loop fails.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState(Arc<AtomicBool>);

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set_connected(&self, connected: bool) {
        self.0.store(connected, Ordering::Release);
    }
}

pub fn connect(broker: &str, port: u16, client_id: String) -> (AsyncClient, EventLoop) {
    info!("Connecting to MQTT broker at {}:{}", broker, port);

    let mut mqtt_options = MqttOptions::new(client_id, broker, port);
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    mqtt_options.set_clean_session(true);

    AsyncClient::new(mqtt_options, REQUEST_CAPACITY)
}

/// Drives the MQTT connection and forwards every publish on `topic` to the
/// subscriber queue. Returns only when the queue is closed.
pub async fn run_mqtt(
    client: AsyncClient,
    mut eventloop: EventLoop,
    topic: String,
    qos: QoS,
    state: ConnectionState,
    tx: mpsc::Sender<ChannelMessage>,
) -> Result<()> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                state.set_connected(true);
                // clean sessions drop subscriptions, so subscribe on every connect
                match client.try_subscribe(topic.as_str(), qos) {
                    Ok(()) => info!("Subscribed to {} with {:?}", topic, qos),
                    Err(e) => error!("Failed to subscribe to {}: {}", topic, e),
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if publish.topic != topic {
                    debug!("Ignoring message on unrelated topic {}", publish.topic);
                    continue;
                }

                MESSAGES_TOTAL.inc();
                debug!(
                    "Received message on topic {}, size: {} bytes",
                    publish.topic,
                    publish.payload.len()
                );

                let message = ChannelMessage::new(publish.topic, publish.payload.to_vec());
                forward(&tx, message).await?;
            }
            Ok(_) => {}
            Err(e) => {
                state.set_connected(false);
                error!("MQTT error: {}", e);
                // rumqttc reconnects on the next poll
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Polls a publish-only connection, keeping `state` up to date.
pub async fn run_eventloop(mut eventloop: EventLoop, state: ConnectionState) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Connected to MQTT broker");
                state.set_connected(true);
            }
            Ok(_) => {}
            Err(e) => {
                state.set_connected(false);
                error!("MQTT eventloop error: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Hands a message to the subscriber, waiting when the queue is full.
pub async fn forward(tx: &mpsc::Sender<ChannelMessage>, message: ChannelMessage) -> Result<()> {
    match tx.try_send(message) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(message)) => {
            CHANNEL_FULL_TOTAL.inc();
            warn!("Subscriber queue full, waiting for capacity");
            tx.send(message).await.map_err(|_| Error::ChannelSend)
        }
        Err(TrySendError::Closed(_)) => {
            error!("Subscriber queue closed, cannot forward message");
            Err(Error::ChannelSend)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_levels() {
        assert_eq!(qos_from_level(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(qos_from_level(1).unwrap(), QoS::AtLeastOnce);
        assert_eq!(qos_from_level(2).unwrap(), QoS::ExactlyOnce);
        assert!(qos_from_level(3).is_err());
    }

    #[test]
    fn test_connection_state_starts_disconnected() {
        let state = ConnectionState::new();
        assert!(!state.is_connected());

        let shared = state.clone();
        shared.set_connected(true);
        assert!(state.is_connected());
        shared.set_connected(false);
        assert!(!state.is_connected());
    }

    #[tokio::test]
    async fn test_failed_poll_marks_disconnected() {
        // nothing listens on port 1, so the first poll fails
        let (_client, eventloop) = connect("127.0.0.1", 1, "smartfarm-test".to_string());
        let state = ConnectionState::new();
        state.set_connected(true);

        let handle = tokio::spawn(run_eventloop(eventloop, state.clone()));
        tokio::time::timeout(Duration::from_secs(5), async {
            while state.is_connected() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("connection state was not cleared");

        handle.abort();
    }

    #[test]
    fn test_forward_delivers_message() {
        tokio_test::block_on(async {
            let (tx, mut rx) = mpsc::channel(1);
            forward(&tx, ChannelMessage::new("smartfarm/moisture", "12.5"))
                .await
                .unwrap();

            let received = rx.recv().await.unwrap();
            assert_eq!(received.topic, "smartfarm/moisture");
            assert_eq!(received.payload, b"12.5");
        });
    }

    #[tokio::test]
    async fn test_forward_waits_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        forward(&tx, ChannelMessage::new("t", "1")).await.unwrap();

        let pending = tokio::spawn({
            let tx = tx.clone();
            async move { forward(&tx, ChannelMessage::new("t", "2")).await }
        });

        assert_eq!(rx.recv().await.unwrap().payload, b"1");
        assert_eq!(rx.recv().await.unwrap().payload, b"2");
        assert!(pending.await.unwrap().is_ok());
    }

    #[test]
    fn test_forward_fails_when_closed() {
        tokio_test::block_on(async {
            let (tx, rx) = mpsc::channel(1);
            drop(rx);
            let err = forward(&tx, ChannelMessage::new("t", "1")).await.unwrap_err();
            assert!(matches!(err, Error::ChannelSend));
        });
    }
}
