use crate::errors::Result;
use crate::metrics::{
    INVALID_MESSAGES_TOTAL, READINGS_STORED_TOTAL, STORE_FAILURES_TOTAL, SUBSCRIBER_PROCESSING,
};
use crate::model::{ChannelMessage, Reading};
use crate::store::SharedStore;
use crate::validate::parse_payload;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Drains the subscriber queue, turning each message into a stored reading.
///
/// Messages are handled one at a time in arrival order. A message that cannot
/// be parsed or stored is logged and dropped; nothing is retried.
pub async fn run_subscriber(mut rx: mpsc::Receiver<ChannelMessage>, store: SharedStore) {
    info!("Subscriber started");
    SUBSCRIBER_PROCESSING.set(0.0);

    while let Some(message) = rx.recv().await {
        SUBSCRIBER_PROCESSING.set(1.0);
        let _ = handle_message(&store, message).await;
        SUBSCRIBER_PROCESSING.set(0.0);
    }

    info!("Subscriber queue closed, subscriber stopped");
}

/// Parses and persists a single message. Failures are already logged and
/// counted when this returns an error.
pub async fn handle_message(store: &SharedStore, message: ChannelMessage) -> Result<Reading> {
    let value = match parse_payload(&message.payload) {
        Ok(value) => value,
        Err(e) => {
            INVALID_MESSAGES_TOTAL.inc();
            warn!("Discarding message on {}: {}", message.topic, e);
            return Err(e);
        }
    };

    let reading = Reading {
        timestamp: message.received_at,
        value,
    };

    if let Err(e) = store.insert_reading(&reading).await {
        STORE_FAILURES_TOTAL.inc();
        error!("Failed to store reading {:.2}, dropping it: {}", value, e);
        return Err(e);
    }

    READINGS_STORED_TOTAL.inc();
    debug!("Stored reading {:.2} at {}", reading.value, reading.timestamp);
    Ok(reading)
}
