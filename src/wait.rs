use crate::sequence::{minimum_sequence, Sequence};
use std::sync::atomic::{fence, AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use thiserror::Error;

/// Spin iterations the yielding strategy burns before surrendering the
/// CPU once.
const SPIN_TRIES_BEFORE_YIELD: u32 = 100;

/// Returned from a wait when the owning consumer has been told to stop;
/// there is no sequence to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("consumer alerted while waiting")]
pub struct Alerted;

/// How a consumer burns time until its target sequence becomes available.
///
/// Both variants spin without sleeping, parking, or allocating, so there
/// are no spurious wake-ups to consider. Dispatch is static; the hot loop
/// never goes through a vtable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Tight loop re-reading the gating minimum every iteration. Lowest
    /// latency, burns a core.
    BusySpin,
    /// Spins up to 100 iterations, then yields the scheduler and starts
    /// over. Near-busy-spin latency without starving co-scheduled
    /// threads.
    #[default]
    Yielding,
}

impl WaitStrategy {
    /// Blocks until some sequence `>= target` is available, returning the
    /// highest available sequence: the largest value that is `<= cursor`
    /// and `<=` every dependent sequence. The surplus over `target` is
    /// what enables batch delivery.
    ///
    /// `alert` is examined only after an availability check has already
    /// failed, so delivery never pays for it.
    pub(crate) fn wait_for(
        &self,
        target: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AtomicBool,
    ) -> Result<i64, Alerted> {
        match self {
            WaitStrategy::BusySpin => loop {
                let available = cursor.get().min(minimum_sequence(dependents));
                if available >= target {
                    return Ok(available);
                }
                if alert.load(Ordering::Acquire) {
                    return Err(Alerted);
                }
                // This fence does not establish synchronization (the
                // acquire loads above already do); it reduces aggressive
                // loop optimization on some architectures.
                fence(Ordering::Acquire);
            },
            WaitStrategy::Yielding => {
                let mut spin_tries = 0u32;
                loop {
                    let available = cursor.get().min(minimum_sequence(dependents));
                    if available >= target {
                        return Ok(available);
                    }
                    if alert.load(Ordering::Acquire) {
                        return Err(Alerted);
                    }
                    spin_tries += 1;
                    if spin_tries > SPIN_TRIES_BEFORE_YIELD {
                        thread::yield_now();
                        spin_tries = 0;
                    }
                }
            }
        }
    }

    /// Hook for strategies that park waiters. Both current strategies
    /// spin, so there is nobody to signal.
    #[allow(dead_code)]
    pub(crate) fn signal_all_when_blocking(&self) {}
}
