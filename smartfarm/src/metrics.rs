use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref MESSAGES_TOTAL: Counter = counter(
        "smartfarm_messages_total",
        "Total messages received on the telemetry topic"
    );
    pub static ref READINGS_STORED_TOTAL: Counter = counter(
        "smartfarm_readings_stored_total",
        "Total readings persisted by the subscriber"
    );
    pub static ref INVALID_MESSAGES_TOTAL: Counter = counter(
        "smartfarm_invalid_messages_total",
        "Total messages dropped because the payload was not a valid reading"
    );
    pub static ref STORE_FAILURES_TOTAL: Counter = counter(
        "smartfarm_store_failures_total",
        "Total readings dropped because the store write failed"
    );
    pub static ref CHANNEL_FULL_TOTAL: Counter = counter(
        "smartfarm_channel_full_total",
        "Total number of times the subscriber queue was full (backpressure events)"
    );
    pub static ref PUBLISHED_TOTAL: Counter = counter(
        "smartfarm_published_total",
        "Total simulated readings handed to the broker"
    );
    pub static ref PUBLISH_DROPPED_TOTAL: Counter = counter(
        "smartfarm_publish_dropped_total",
        "Total simulated readings dropped because the channel was unavailable"
    );
    pub static ref SUBSCRIBER_PROCESSING: Gauge = Gauge::with_opts(Opts::new(
        "smartfarm_subscriber_processing",
        "1 while the subscriber is handling a message, 0 while idle"
    ))
    .expect("valid gauge options");
}

fn counter(name: &str, help: &str) -> Counter {
    Counter::with_opts(Opts::new(name, help)).expect("valid counter options")
}

pub fn init_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(MESSAGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(READINGS_STORED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INVALID_MESSAGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORE_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CHANNEL_FULL_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PUBLISHED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PUBLISH_DROPPED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SUBSCRIBER_PROCESSING.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_metrics_are_exported() {
        // the registry is process-wide; another test may have registered already
        let _ = init_metrics();
        MESSAGES_TOTAL.inc();

        let text = gather_metrics().unwrap();
        assert!(text.contains("smartfarm_messages_total"));
        assert!(text.contains("smartfarm_subscriber_processing"));
    }
}
