use crate::barrier::{ConsumerBarrier, ProducerBarrier};
use crate::claim::ClaimMode;
use crate::config::Config;
use crate::consumer::{BatchHandler, Consumer};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::ring::{DefaultFactory, EntryFactory, RingBuffer};
use crate::sequence::Sequence;
use crate::wait::WaitStrategy;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use thiserror::Error;

/// Rejected configurations and wiring mistakes, raised at construction
/// and registration time. Nothing on the hot path returns errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Requested capacity was zero.
    #[error("capacity must be at least 1")]
    ZeroCapacity,
    /// Multi-producer publishing is not fully ordered in this engine; use
    /// the single-producer claim mode.
    #[error("multi-producer claiming is not supported; use ClaimMode::SingleProducer")]
    UnsupportedClaimMode,
    /// The gating set is frozen once the producer barrier has been taken
    /// or the pipeline started; register every consumer first.
    #[error("consumers must be registered before the producer barrier is taken")]
    ConsumersFrozen,
    /// There is exactly one producer barrier per pipeline.
    #[error("the producer barrier has already been taken")]
    ProducerBarrierTaken,
}

/// Handle to a registered consumer: names it as a dependency for
/// downstream consumers and exposes its progress for watchdogs.
///
/// Because a ref only exists after `add_consumer` returns, dependency
/// graphs are acyclic by construction.
#[derive(Debug, Clone)]
pub struct ConsumerRef {
    sequence: Arc<Sequence>,
}

impl ConsumerRef {
    /// Highest sequence this consumer has fully handled; `-1` before the
    /// first batch.
    pub fn position(&self) -> i64 {
        self.sequence.get()
    }
}

/// Composes the ring buffer, one producer barrier, and a DAG of consumer
/// workers into a running pipeline.
///
/// Wiring happens in three frozen phases: register every consumer, take
/// the producer barrier, `start`. Every registered consumer's sequence
/// joins the gating set, so the producer can never lap the slowest
/// consumer.
///
/// # Example
///
/// ```
/// use ringflow::{BatchHandler, Config, Pipeline};
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Event {
///     value: u64,
/// }
///
/// struct Sum(Arc<AtomicU64>);
///
/// impl BatchHandler<Event> for Sum {
///     fn on_available(&mut self, entry: &Event, _sequence: i64, _end_of_batch: bool) {
///         self.0.fetch_add(entry.value, Ordering::Relaxed);
///     }
/// }
///
/// let sum = Arc::new(AtomicU64::new(0));
/// let mut pipeline = Pipeline::<Event>::with_default_entries(Config::new(8)).unwrap();
/// let consumer = pipeline.add_consumer(Sum(Arc::clone(&sum)), &[]).unwrap();
/// let mut producer = pipeline.producer_barrier().unwrap();
/// pipeline.start();
///
/// for value in 1..=3 {
///     let seq = producer.next_entry();
///     producer.entry(seq).value = value;
///     producer.commit(seq);
/// }
///
/// while consumer.position() < 2 {
///     std::thread::yield_now();
/// }
/// pipeline.stop();
/// assert_eq!(sum.load(Ordering::Relaxed), 6);
/// ```
pub struct Pipeline<T> {
    ring: Arc<RingBuffer<T>>,
    wait_strategy: WaitStrategy,
    metrics: Option<Arc<Metrics>>,
    consumers: Vec<Consumer<T>>,
    gating: Vec<Arc<Sequence>>,
    producer_taken: bool,
    started: bool,
}

impl<T> std::fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("producer_taken", &self.producer_taken)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl<T> Pipeline<T> {
    /// Validates `config` and builds the pipeline with the given entry
    /// factory.
    pub fn new(
        config: Config,
        factory: impl EntryFactory<T> + 'static,
    ) -> Result<Self, BuildError> {
        if config.capacity == 0 {
            return Err(BuildError::ZeroCapacity);
        }
        if config.claim_mode != ClaimMode::SingleProducer {
            return Err(BuildError::UnsupportedClaimMode);
        }

        Ok(Self {
            ring: Arc::new(RingBuffer::new(config.capacity, Box::new(factory))),
            wait_strategy: config.wait_strategy,
            metrics: config.enable_metrics.then(|| Arc::new(Metrics::new())),
            consumers: Vec::new(),
            gating: Vec::new(),
            producer_taken: false,
            started: false,
        })
    }

    /// Builds the pipeline with slots initialized to `T::default()`.
    pub fn with_default_entries(config: Config) -> Result<Self, BuildError>
    where
        T: Default,
    {
        Self::new(config, DefaultFactory)
    }

    /// Registers a consumer with the given upstream dependencies and adds
    /// its sequence to the gating set. Must happen before the producer
    /// barrier is taken.
    pub fn add_consumer(
        &mut self,
        handler: impl BatchHandler<T> + 'static,
        dependencies: &[&ConsumerRef],
    ) -> Result<ConsumerRef, BuildError> {
        if self.producer_taken || self.started {
            return Err(BuildError::ConsumersFrozen);
        }

        let dependents: Vec<Arc<Sequence>> = dependencies
            .iter()
            .map(|d| Arc::clone(&d.sequence))
            .collect();
        let alert = Arc::new(AtomicBool::new(false));
        let barrier = ConsumerBarrier::new(
            Arc::clone(&self.ring),
            self.wait_strategy,
            dependents,
            Arc::clone(&alert),
        );
        let sequence = Arc::new(Sequence::default());
        self.gating.push(Arc::clone(&sequence));
        self.consumers.push(Consumer::new(
            barrier,
            Box::new(handler),
            Arc::clone(&sequence),
            alert,
            self.metrics.clone(),
        ));

        Ok(ConsumerRef { sequence })
    }

    /// Takes the single producer barrier, freezing the gating set.
    pub fn producer_barrier(&mut self) -> Result<ProducerBarrier<T>, BuildError> {
        if self.producer_taken {
            return Err(BuildError::ProducerBarrierTaken);
        }
        self.producer_taken = true;
        Ok(ProducerBarrier::new(
            Arc::clone(&self.ring),
            self.gating.clone(),
            self.metrics.clone(),
        ))
    }

    /// Launches every consumer worker, in registration order.
    pub fn start(&mut self)
    where
        T: Send + Sync + 'static,
    {
        if self.started {
            return;
        }
        self.started = true;
        for consumer in &mut self.consumers {
            consumer.start();
        }
    }

    /// Signals every consumer to stop, then joins each worker thread.
    /// Join order is not load-bearing: each worker observes its own
    /// signal independently.
    pub fn stop(&mut self) {
        for consumer in &self.consumers {
            consumer.signal_stop();
        }
        for consumer in &mut self.consumers {
            consumer.join();
        }
    }

    /// Rounded slot count; a power of two at least the requested size.
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Highest published sequence; `-1` before the first commit.
    pub fn cursor(&self) -> i64 {
        self.ring.cursor().get()
    }

    /// Throughput counters; zeroed when metrics are disabled.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics
            .as_ref()
            .map(|m| m.snapshot())
            .unwrap_or_default()
    }
}

impl<T> Drop for Pipeline<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
