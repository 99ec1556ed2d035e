//! ringflow - Single-Producer, Multi-Consumer Event Pipeline
//!
//! An in-memory event pipeline built around a pre-allocated ring buffer
//! of power-of-two capacity. One producing thread hands fixed-slot
//! entries to a DAG of consuming threads with ordered, bounded,
//! batch-aware delivery and backpressure driven by the slowest consumer.
//!
//! # Key Features
//!
//! - Pre-allocated slots, reused in place (no allocation after startup)
//! - Single shared cursor as the only publish point
//! - Batch delivery: one wait can hand a consumer a contiguous range
//! - Consumer DAGs: downstream stages never overtake their dependencies
//! - Spin and yield wait strategies (no blocking, no parking)
//! - Cache-line-isolated sequences (128-byte alignment)
//!
//! # Example
//!
//! ```
//! use ringflow::{BatchHandler, Config, Pipeline};
//! use std::sync::atomic::{AtomicI64, Ordering};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Event {
//!     value: i64,
//! }
//!
//! struct LastSeen(Arc<AtomicI64>);
//!
//! impl BatchHandler<Event> for LastSeen {
//!     fn on_available(&mut self, entry: &Event, _sequence: i64, _end_of_batch: bool) {
//!         self.0.store(entry.value, Ordering::Relaxed);
//!     }
//! }
//!
//! let last = Arc::new(AtomicI64::new(-1));
//! let mut pipeline = Pipeline::<Event>::with_default_entries(Config::new(64)).unwrap();
//! let consumer = pipeline.add_consumer(LastSeen(Arc::clone(&last)), &[]).unwrap();
//! let mut producer = pipeline.producer_barrier().unwrap();
//! pipeline.start();
//!
//! for i in 0..10 {
//!     let seq = producer.next_entry();
//!     producer.entry(seq).value = i;
//!     producer.commit(seq);
//! }
//!
//! while consumer.position() < 9 {
//!     std::thread::yield_now();
//! }
//! assert_eq!(last.load(Ordering::Relaxed), 9);
//! pipeline.stop();
//! ```
//!
//! # Slot reuse contract
//!
//! Slot storage is constructed once and overwritten in place for the
//! lifetime of the pipeline. Payloads that own external resources must
//! release them in [`EntryFactory::reset`] (called before every re-use
//! write) or be plain data; see [`EntryFactory`].

mod barrier;
mod claim;
mod config;
mod consumer;
mod metrics;
mod pipeline;
mod ring;
mod sequence;
mod wait;

pub use barrier::{ConsumerBarrier, ProducerBarrier};
pub use claim::ClaimMode;
pub use config::{Config, HIGH_THROUGHPUT_CONFIG, LOW_LATENCY_CONFIG};
pub use consumer::BatchHandler;
pub use metrics::{Metrics, MetricsSnapshot};
pub use pipeline::{BuildError, ConsumerRef, Pipeline};
pub use ring::{DefaultFactory, EntryFactory, RingBuffer};
pub use sequence::{Sequence, INITIAL_SEQUENCE};
pub use wait::{Alerted, WaitStrategy};
