//! Metric declarations for the driver.
//!
//! Every metric the driver records is declared here as a [`Metric`] constant so
//! names stay consistent between the recording sites and the description
//! registered at startup.
//!
//! ```rust
//! use lora_enddevice::metric_defs::{self, MetricKind};
//!
//! assert_eq!(metric_defs::QUEUE_COMMANDS_FAILED.name, "lora.queue.commands_failed");
//! assert_eq!(metric_defs::QUEUE_COMMANDS_FAILED.kind, MetricKind::Counter);
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// Name, kind and description of one recorded metric.
#[derive(Debug, Clone, Copy)]
pub struct Metric {
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    pub unit: Option<Unit>,
    /// Label keys attached at the recording sites.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Declares a counter.
    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    /// Declares a gauge.
    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    /// Declares a histogram.
    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    pub const fn with_description(mut self, text: &'static str) -> Self {
        self.description = text;
        self
    }

    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the installed recorder.
    pub fn describe(&self) {
        let Metric {
            name,
            kind,
            description,
            unit,
            ..
        } = *self;
        match (kind, unit) {
            (MetricKind::Counter, Some(u)) => describe_counter!(name, u, description),
            (MetricKind::Counter, None) => describe_counter!(name, description),
            (MetricKind::Gauge, Some(u)) => describe_gauge!(name, u, description),
            (MetricKind::Gauge, None) => describe_gauge!(name, description),
            (MetricKind::Histogram, Some(u)) => describe_histogram!(name, u, description),
            (MetricKind::Histogram, None) => describe_histogram!(name, description),
        }
    }
}

// Command queue

/// Command writes to the transport, one per attempt.
pub const QUEUE_COMMANDS_WRITTEN: Metric = Metric::counter("lora.queue.commands_written")
    .with_description("Command writes to the serial transport")
    .with_unit(Unit::Count)
    .with_labels(&["command"]);

/// Attempts that ended without a satisfying reply.
pub const QUEUE_RETRIES: Metric = Metric::counter("lora.queue.retries")
    .with_description("Command attempts that timed out waiting for a reply")
    .with_unit(Unit::Count)
    .with_labels(&["command"]);

/// Commands dropped after reaching the retry ceiling.
pub const QUEUE_COMMANDS_FAILED: Metric = Metric::counter("lora.queue.commands_failed")
    .with_description("Commands rejected after exhausting their attempts")
    .with_unit(Unit::Count)
    .with_labels(&["command"]);

/// Commands rejected because the transport was closed.
pub const QUEUE_TRANSPORT_CLOSED: Metric = Metric::counter("lora.queue.transport_closed")
    .with_description("Commands rejected because the serial port was not open")
    .with_unit(Unit::Count);

/// Commands waiting in the queue, including the head.
pub const QUEUE_DEPTH: Metric = Metric::gauge("lora.queue.depth")
    .with_description("Commands queued and not yet settled")
    .with_unit(Unit::Count);

/// Time from write to a satisfying reply.
pub const QUEUE_REPLY_LATENCY: Metric = Metric::histogram("lora.queue.reply_latency_seconds")
    .with_description("Time from command write to a satisfying reply")
    .with_unit(Unit::Seconds)
    .with_labels(&["command"]);

// Network session

/// Join attempts, labelled by outcome (joined, refused, error).
pub const NETWORK_JOIN_ATTEMPTS: Metric = Metric::counter("lora.network.join_attempts")
    .with_description("Join attempts by outcome")
    .with_unit(Unit::Count)
    .with_labels(&["outcome"]);

/// 1 while the device reports joined, 0 otherwise.
pub const NETWORK_JOINED: Metric = Metric::gauge("lora.network.joined")
    .with_description("Whether the device is joined to the network");

/// Uplinks accepted by the radio.
pub const NETWORK_MESSAGES_SENT: Metric = Metric::counter("lora.network.messages_sent")
    .with_description("Uplinks accepted by the radio")
    .with_unit(Unit::Count);

/// Uplinks the radio refused.
pub const NETWORK_SEND_REJECTED: Metric = Metric::counter("lora.network.send_rejected")
    .with_description("Uplinks refused by the radio")
    .with_unit(Unit::Count);

/// Downlink frames received alongside uplinks.
pub const NETWORK_DOWNLINKS: Metric = Metric::counter("lora.network.downlinks")
    .with_description("Downlink frames received")
    .with_unit(Unit::Count);

/// Every metric the driver records.
pub const ALL: &[&Metric] = &[
    &QUEUE_COMMANDS_WRITTEN,
    &QUEUE_RETRIES,
    &QUEUE_COMMANDS_FAILED,
    &QUEUE_TRANSPORT_CLOSED,
    &QUEUE_DEPTH,
    &QUEUE_REPLY_LATENCY,
    &NETWORK_JOIN_ATTEMPTS,
    &NETWORK_JOINED,
    &NETWORK_MESSAGES_SENT,
    &NETWORK_SEND_REJECTED,
    &NETWORK_DOWNLINKS,
];

/// Registers descriptions for every metric in [`ALL`].
///
/// Call once after installing a recorder.
pub fn describe_metrics() {
    for metric in ALL {
        metric.describe();
    }
}
