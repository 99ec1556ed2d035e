use crate::claim::ClaimMode;
use crate::wait::WaitStrategy;

/// Configuration for a [`Pipeline`].
///
/// Plain data; validation happens at [`Pipeline::new`], which rejects a
/// zero capacity and the multi-producer claim mode.
///
/// [`Pipeline`]: crate::Pipeline
/// [`Pipeline::new`]: crate::Pipeline::new
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Requested slot count; rounded up to the next power of two.
    pub capacity: usize,
    /// How producer sequences are assigned.
    pub claim_mode: ClaimMode,
    /// How consumers wait for unpublished sequences.
    pub wait_strategy: WaitStrategy,
    /// Enable throughput counters (slight overhead on commit and batch
    /// completion).
    pub enable_metrics: bool,
}

impl Config {
    /// Configuration with the given capacity and the default strategies.
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            claim_mode: ClaimMode::SingleProducer,
            wait_strategy: WaitStrategy::Yielding,
            enable_metrics: false,
        }
    }

    pub const fn with_claim_mode(mut self, claim_mode: ClaimMode) -> Self {
        self.claim_mode = claim_mode;
        self
    }

    pub const fn with_wait_strategy(mut self, wait_strategy: WaitStrategy) -> Self {
        self.wait_strategy = wait_strategy;
        self
    }

    pub const fn with_metrics(mut self) -> Self {
        self.enable_metrics = true;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Low latency configuration: small buffer, busy-spin waits.
pub const LOW_LATENCY_CONFIG: Config =
    Config::new(4096).with_wait_strategy(WaitStrategy::BusySpin);

/// High throughput configuration: large buffer, yielding waits.
pub const HIGH_THROUGHPUT_CONFIG: Config = Config::new(65536);
