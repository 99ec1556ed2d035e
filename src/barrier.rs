use crate::claim::SingleProducerClaim;
use crate::metrics::Metrics;
use crate::ring::RingBuffer;
use crate::sequence::Sequence;
use crate::wait::{Alerted, WaitStrategy};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

/// Producer-facing façade over the ring buffer: claim, write, commit.
///
/// There is exactly one per pipeline, handed out by
/// [`Pipeline::producer_barrier`]. Claiming takes `&mut self`, so the type
/// system enforces the single-writer protocol; move the barrier to
/// whichever thread produces.
///
/// The claim loop is where backpressure lives: while the slowest gating
/// sequence is more than a buffer-length behind, the producer
/// cooperatively yields instead of overwriting unconsumed slots.
///
/// [`Pipeline::producer_barrier`]: crate::Pipeline::producer_barrier
pub struct ProducerBarrier<T> {
    ring: Arc<RingBuffer<T>>,
    claim: SingleProducerClaim,
    gating: Vec<Arc<Sequence>>,
    metrics: Option<Arc<Metrics>>,
}

impl<T> std::fmt::Debug for ProducerBarrier<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerBarrier").finish_non_exhaustive()
    }
}

impl<T> ProducerBarrier<T> {
    pub(crate) fn new(
        ring: Arc<RingBuffer<T>>,
        gating: Vec<Arc<Sequence>>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let claim = SingleProducerClaim::new(ring.capacity());
        Self {
            ring,
            claim,
            gating,
            metrics,
        }
    }

    /// Claims the next sequence, yielding until capacity is available.
    #[inline]
    pub fn next_entry(&mut self) -> i64 {
        self.next_batch(1)
    }

    /// Claims the next `n` sequences and returns the highest; the claimed
    /// range is `[result - n + 1, result]` and every slot in it must be
    /// written before the range is committed.
    pub fn next_batch(&mut self, n: i64) -> i64 {
        if !self.claim.has_available_capacity(n, &self.gating) {
            if let Some(metrics) = &self.metrics {
                metrics.record_producer_stall();
            }
            while !self.claim.has_available_capacity(n, &self.gating) {
                thread::yield_now();
            }
        }
        // Check and claim are sequentially ordered on this thread, so the
        // capacity just proven cannot be eroded in between.
        self.claim.next(n)
    }

    /// Resets the slot for a claimed sequence and hands it out for
    /// writing.
    #[inline]
    pub fn entry(&mut self, sequence: i64) -> &mut T {
        self.ring.prepare_for_write(sequence);
        // SAFETY: `sequence` is claimed and unpublished, so this thread is
        // the only one that can touch its slot; `&mut self` keeps the
        // borrow exclusive on this side too.
        unsafe { &mut *self.ring.slot(sequence) }
    }

    /// Publishes a written entry, making it observable to consumers.
    #[inline]
    pub fn commit(&mut self, sequence: i64) {
        self.ring.publish(sequence);
        if let Some(metrics) = &self.metrics {
            metrics.record_publish(1);
        }
    }

    /// Publishes a fully written claimed range `[lo, hi]` in one cursor
    /// advance.
    #[inline]
    pub fn commit_range(&mut self, lo: i64, hi: i64) {
        self.ring.publish_range(lo, hi);
        if let Some(metrics) = &self.metrics {
            metrics.record_publish((hi - lo + 1) as u64);
        }
    }

    /// Last claimed sequence; `-1` before the first claim. Claimed is not
    /// published: the cursor may trail this while entries are being
    /// written.
    #[inline]
    pub fn last_claimed(&self) -> i64 {
        self.claim.last_claimed()
    }
}

/// Consumer-facing façade: resolves the highest available sequence and
/// lends out slots for reading.
///
/// Availability is the minimum of the buffer cursor and every upstream
/// dependency sequence, so a consumer can never observe an entry before
/// the stages it depends on have finished with it.
pub struct ConsumerBarrier<T> {
    ring: Arc<RingBuffer<T>>,
    wait_strategy: WaitStrategy,
    dependents: Vec<Arc<Sequence>>,
    alert: Arc<AtomicBool>,
}

impl<T> ConsumerBarrier<T> {
    pub(crate) fn new(
        ring: Arc<RingBuffer<T>>,
        wait_strategy: WaitStrategy,
        dependents: Vec<Arc<Sequence>>,
        alert: Arc<AtomicBool>,
    ) -> Self {
        Self {
            ring,
            wait_strategy,
            dependents,
            alert,
        }
    }

    /// Blocks until `sequence` is available and returns the highest
    /// available sequence (enabling batch delivery), or [`Alerted`] once
    /// the owning consumer has been told to stop.
    #[inline]
    pub fn wait_for(&self, sequence: i64) -> Result<i64, Alerted> {
        self.wait_strategy
            .wait_for(sequence, self.ring.cursor(), &self.dependents, &self.alert)
    }

    /// Borrows the slot for `sequence`.
    ///
    /// Callers must only pass sequences `<=` the most recent `wait_for`
    /// result; the acquire load inside the wait is what makes the slot
    /// contents visible.
    #[inline]
    pub fn entry(&self, sequence: i64) -> &T {
        // SAFETY: sequence was covered by a wait_for result, so the
        // producer published it and cannot reclaim the slot until every
        // gating sequence (including this consumer's) passes it.
        unsafe { &*self.ring.slot(sequence) }
    }
}
