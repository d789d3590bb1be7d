//! Pacer that records delays instead of sleeping.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

use banlist_core::{sample_jitter, Pacer};

/// A recorded pacer interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacerCall {
    /// `sleep(duration)`
    Sleep(Duration),
    /// `jitter(upper)` and the value it returned
    Jitter {
        /// Requested exclusive upper bound
        upper: Duration,
        /// Sampled delay
        sampled: Duration,
    },
}

/// Records every sleep and yields instead of waiting.
#[derive(Debug)]
pub struct RecordingPacer {
    rng: Mutex<StdRng>,
    calls: Mutex<Vec<PacerCall>>,
}

impl RecordingPacer {
    /// Pacer with a fixed jitter seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// All recorded calls.
    pub fn calls(&self) -> Vec<PacerCall> {
        self.calls.lock().clone()
    }

    /// Recorded sleeps only.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                PacerCall::Sleep(duration) => Some(*duration),
                PacerCall::Jitter { .. } => None,
            })
            .collect()
    }

    /// Recorded jitter samples as `(upper, sampled)`.
    pub fn jitters(&self) -> Vec<(Duration, Duration)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                PacerCall::Jitter { upper, sampled } => Some((*upper, *sampled)),
                PacerCall::Sleep(_) => None,
            })
            .collect()
    }
}

impl Default for RecordingPacer {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn sleep(&self, duration: Duration) {
        self.calls.lock().push(PacerCall::Sleep(duration));
        tokio::task::yield_now().await;
    }

    fn jitter(&self, upper: Duration) -> Duration {
        let sampled = sample_jitter(&mut *self.rng.lock(), upper);
        self.calls.lock().push(PacerCall::Jitter { upper, sampled });
        sampled
    }
}
