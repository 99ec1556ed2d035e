use crate::sequence::{minimum_sequence, Sequence, INITIAL_SEQUENCE};
use std::sync::Arc;

/// How producer sequences are assigned.
///
/// Only `SingleProducer` is implemented. Multi-producer publication needs
/// a per-slot availability map to keep out-of-order commits ordered, which
/// this engine does not carry; requesting it fails pipeline construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClaimMode {
    /// One producing thread; claims and capacity checks are sequentially
    /// ordered on that thread, so no atomics are needed for assignment.
    #[default]
    SingleProducer,
    /// Rejected at construction with [`BuildError::UnsupportedClaimMode`].
    ///
    /// [`BuildError::UnsupportedClaimMode`]: crate::BuildError::UnsupportedClaimMode
    MultiProducer,
}

/// Sequence assignment and capacity accounting for the single producer.
///
/// `cached_gating` memoizes the last observed minimum of the gating
/// sequences so the common case of a fast producer racing slow consumers
/// is one comparison; the gating sequences are re-read (acquire loads)
/// only when the cached value no longer proves capacity.
#[derive(Debug)]
pub(crate) struct SingleProducerClaim {
    buffer_size: i64,
    next_value: i64,
    cached_gating: i64,
}

impl SingleProducerClaim {
    pub(crate) fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size as i64,
            next_value: INITIAL_SEQUENCE,
            cached_gating: INITIAL_SEQUENCE,
        }
    }

    /// Assigns the next `n` sequences and returns the highest. The caller
    /// must have just proven capacity with `has_available_capacity`.
    #[inline]
    pub(crate) fn next(&mut self, n: i64) -> i64 {
        self.next_value += n;
        self.next_value
    }

    /// Whether `n` more sequences can be assigned without overwriting a
    /// slot some gating sequence has not passed.
    pub(crate) fn has_available_capacity(
        &mut self,
        n: i64,
        gating: &[Arc<Sequence>],
    ) -> bool {
        let wrap_point = self.next_value + n - self.buffer_size;

        if wrap_point > self.cached_gating {
            let min_sequence = minimum_sequence(gating);
            self.cached_gating = min_sequence;

            if wrap_point > min_sequence {
                return false;
            }
        }

        true
    }

    /// Last assigned sequence; `-1` before the first claim.
    #[inline]
    pub(crate) fn last_claimed(&self) -> i64 {
        self.next_value
    }
}
