use std::sync::atomic::{AtomicI64, Ordering};

/// Value of every sequence before anything has been claimed or published.
pub const INITIAL_SEQUENCE: i64 = -1;

/// A monotonic 64-bit counter, the unit of ordering in the pipeline.
///
/// Producers publish by advancing the ring buffer's cursor sequence;
/// consumers advance their own sequence after handling a batch. Every
/// cross-thread read uses acquire ordering and every advancement uses
/// release ordering, so a reader that observes a sequence value also
/// observes all writes made before it was set.
///
/// The counter occupies its own cache line so that a producer hammering
/// one sequence never invalidates the line a consumer's sequence lives
/// on. The alignment is 128 rather than 64 because some CPUs fetch the
/// neighbouring line alongside the one they were asked for, which would
/// couple two 64-byte-aligned counters again.
#[derive(Debug)]
#[repr(align(128))]
pub struct Sequence {
    value: AtomicI64,
}

impl Sequence {
    /// Creates a sequence starting at `initial`.
    pub fn new(initial: i64) -> Self {
        Self {
            value: AtomicI64::new(initial),
        }
    }

    /// Current value, acquire ordering.
    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Single-writer publication point, release ordering.
    #[inline]
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }

    /// Sequentially consistent store. Not used on the hot path; reserved
    /// for fence-style updates.
    #[inline]
    pub fn set_volatile(&self, value: i64) {
        self.value.store(value, Ordering::SeqCst);
    }

    /// Compare-and-set: release on success, acquire on failure.
    #[inline]
    pub fn compare_and_set(&self, expected: i64, desired: i64) -> bool {
        self.value
            .compare_exchange(expected, desired, Ordering::Release, Ordering::Acquire)
            .is_ok()
    }

    /// Atomically adds 1 and returns the post-increment value.
    #[inline]
    pub fn increment_and_get(&self) -> i64 {
        self.add_and_get(1)
    }

    /// Atomically adds `n` and returns the post-add value.
    #[inline]
    pub fn add_and_get(&self, n: i64) -> i64 {
        self.value.fetch_add(n, Ordering::Release) + n
    }

    /// Advances the value to `value` only if it is strictly greater than
    /// the current value; no-op otherwise. Keeps the sequence
    /// non-decreasing even if writers race.
    pub fn set_monotonic(&self, value: i64) {
        let mut current = self.value.load(Ordering::Acquire);
        while value > current {
            match self.value.compare_exchange_weak(
                current,
                value,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(INITIAL_SEQUENCE)
    }
}

/// Minimum over a set of sequences; `i64::MAX` when the set is empty, so
/// an empty gating set never bounds the producer.
pub(crate) fn minimum_sequence(sequences: &[std::sync::Arc<Sequence>]) -> i64 {
    sequences.iter().map(|s| s.get()).min().unwrap_or(i64::MAX)
}
