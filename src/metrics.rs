use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing a running pipeline.
///
/// Everything here is observability data, never coordination state. The
/// hot paths bump the counters with relaxed atomic adds, so a snapshot
/// taken mid-run can trail the worker threads by a few events; totals are
/// exact once the pipeline has stopped.
#[derive(Debug, Default)]
pub struct Metrics {
    published: AtomicU64,
    delivered: AtomicU64,
    batches: AtomicU64,
    producer_stalls: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// The producer committed `count` entries.
    pub(crate) fn record_publish(&self, count: u64) {
        self.published.fetch_add(count, Ordering::Relaxed);
    }

    /// A consumer finished a wait round that delivered `len` entries.
    pub(crate) fn record_batch(&self, len: u64) {
        self.delivered.fetch_add(len, Ordering::Relaxed);
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    /// A claim found the buffer full and had to wait on consumers.
    pub(crate) fn record_producer_stall(&self) {
        self.producer_stalls.fetch_add(1, Ordering::Relaxed);
    }

    /// Total entries committed by the producer.
    pub fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Total entries handed to handlers, summed over every consumer; with
    /// fan-out this exceeds `events_published`.
    pub fn events_delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Wait rounds that delivered at least one entry.
    pub fn batches_delivered(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    /// Claims that blocked on backpressure before being granted.
    pub fn producer_stalls(&self) -> u64 {
        self.producer_stalls.load(Ordering::Relaxed)
    }

    /// Copies every counter into plain data.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_published: self.events_published(),
            events_delivered: self.events_delivered(),
            batches_delivered: self.batches_delivered(),
            producer_stalls: self.producer_stalls(),
        }
    }
}

/// The counters at one instant, as plain copyable data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub events_published: u64,
    pub events_delivered: u64,
    pub batches_delivered: u64,
    pub producer_stalls: u64,
}
