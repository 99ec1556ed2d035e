use crate::barrier::ConsumerBarrier;
use crate::metrics::Metrics;
use crate::sequence::Sequence;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Callback invoked on a consumer's dedicated thread.
///
/// Entries arrive in ascending sequence order, each exactly once per
/// consumer. `end_of_batch` is true only on the last entry of the current
/// wait round, letting handlers amortize flushes across a batch.
///
/// Entries are borrowed shared because fan-out consumers may read the same
/// slot concurrently. A handler that needs to leave results in the entry
/// for downstream stages uses atomic payload fields; the dependency
/// ordering (this consumer's sequence is released after the batch, and
/// acquired inside the downstream wait) makes relaxed accesses to those
/// fields race-free.
///
/// A panic out of `on_available` is a handler fault: the consumer stops,
/// `on_completion` runs, and the consumer's sequence stops advancing,
/// which eventually stalls the producer through backpressure. There is no
/// automatic restart.
pub trait BatchHandler<T>: Send {
    /// Called for every published entry, in sequence order.
    fn on_available(&mut self, entry: &T, sequence: i64, end_of_batch: bool);

    /// Called exactly once when the consumer shuts down, whether by
    /// `stop` or by a handler fault.
    fn on_completion(&mut self) {}
}

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPING: u8 = 2;

/// A dedicated worker thread pulling entry ranges through a
/// [`ConsumerBarrier`] and feeding them to a [`BatchHandler`].
///
/// Owned and orchestrated by the pipeline; the public face of a consumer
/// is the [`ConsumerRef`] returned at registration.
///
/// [`ConsumerRef`]: crate::ConsumerRef
pub(crate) struct Consumer<T> {
    state: Arc<AtomicU8>,
    sequence: Arc<Sequence>,
    alert: Arc<AtomicBool>,
    seed: Option<WorkerSeed<T>>,
    handle: Option<JoinHandle<()>>,
}

struct WorkerSeed<T> {
    barrier: ConsumerBarrier<T>,
    handler: Box<dyn BatchHandler<T>>,
    metrics: Option<Arc<Metrics>>,
}

impl<T> Consumer<T> {
    pub(crate) fn new(
        barrier: ConsumerBarrier<T>,
        handler: Box<dyn BatchHandler<T>>,
        sequence: Arc<Sequence>,
        alert: Arc<AtomicBool>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(IDLE)),
            sequence,
            alert,
            seed: Some(WorkerSeed {
                barrier,
                handler,
                metrics,
            }),
            handle: None,
        }
    }

    /// Launches the worker thread. No-op unless the consumer is idle with
    /// its work still unconsumed (a consumer does not restart).
    pub(crate) fn start(&mut self)
    where
        T: Send + Sync + 'static,
    {
        let Some(seed) = self.seed.take() else {
            return;
        };
        self.state.store(RUNNING, Ordering::Release);

        let state = Arc::clone(&self.state);
        let sequence = Arc::clone(&self.sequence);
        self.handle = Some(thread::spawn(move || {
            run(seed, &sequence, &state);
        }));
    }

    /// Flips the state to Stopping and alerts the barrier so a worker
    /// blocked inside a wait unblocks. Does not join.
    pub(crate) fn signal_stop(&self) {
        let _ = self.state.compare_exchange(
            RUNNING,
            STOPPING,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.alert.store(true, Ordering::Release);
    }

    /// Waits for the worker thread to exit.
    pub(crate) fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub(crate) fn stop(&mut self) {
        self.signal_stop();
        self.join();
    }
}

impl<T> Drop for Consumer<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker loop: wait, deliver the batch in order, publish progress.
fn run<T>(seed: WorkerSeed<T>, sequence: &Sequence, state: &AtomicU8) {
    let WorkerSeed {
        barrier,
        mut handler,
        metrics,
    } = seed;

    let mut next_sequence = sequence.get() + 1;

    while state.load(Ordering::Acquire) == RUNNING {
        let available = match barrier.wait_for(next_sequence) {
            Ok(available) => available,
            Err(_alerted) => break,
        };

        let batch_start = next_sequence;
        let batch = catch_unwind(AssertUnwindSafe(|| {
            while next_sequence <= available {
                let entry = barrier.entry(next_sequence);
                let end_of_batch = next_sequence == available;
                handler.on_available(entry, next_sequence, end_of_batch);
                next_sequence += 1;
            }
        }));
        // Handler fault: leave the sequence at the last completed batch
        // and shut down; the stalled sequence is the backpressure signal.
        if batch.is_err() {
            break;
        }

        // Release store: downstream waiters that acquire this sequence
        // observe every handler side effect of the batch.
        sequence.set(available);

        if let Some(metrics) = &metrics {
            metrics.record_batch((available - batch_start + 1) as u64);
        }
    }

    handler.on_completion();
    state.store(IDLE, Ordering::Release);
}
