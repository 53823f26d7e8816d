use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, TextEncoder};

static MESSAGES_SENT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::with_opts(Opts::new(
        "messaging_messages_sent_total",
        "Messages durably persisted by the messaging service",
    ))
    .expect("failed to create messaging_messages_sent_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register messaging_messages_sent_total");
    counter
});

static READ_RECEIPTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::with_opts(Opts::new(
        "messaging_read_receipts_total",
        "Messages transitioned from unread to read",
    ))
    .expect("failed to create messaging_read_receipts_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register messaging_read_receipts_total");
    counter
});

static FANOUT_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "messaging_fanout_events_total",
            "Delivery events accepted by live channels, by event type",
        ),
        &["event"],
    )
    .expect("failed to create messaging_fanout_events_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register messaging_fanout_events_total");
    counter
});

static FANOUT_DROPPED_CHANNELS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::with_opts(Opts::new(
        "messaging_fanout_dropped_channels_total",
        "Delivery channels pruned because the subscriber went away",
    ))
    .expect("failed to create messaging_fanout_dropped_channels_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register messaging_fanout_dropped_channels_total");
    counter
});

pub fn record_message_sent() {
    MESSAGES_SENT_TOTAL.inc();
}

pub fn record_read_receipts(count: u64) {
    READ_RECEIPTS_TOTAL.inc_by(count);
}

pub fn record_fanout(event: &str, delivered: u64) {
    FANOUT_EVENTS_TOTAL
        .with_label_values(&[event])
        .inc_by(delivered);
}

pub fn record_dropped_channels(count: u64) {
    FANOUT_DROPPED_CHANNELS_TOTAL.inc_by(count);
}

/// Text exposition for the transport layer's scrape endpoint.
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
