//! Tokio-backed pacer for production use

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

use banlist_core::{sample_jitter, Pacer};

/// Sleeps on the tokio timer and samples jitter from a seeded `StdRng`.
#[derive(Debug)]
pub struct TokioPacer {
    rng: Mutex<StdRng>,
}

impl TokioPacer {
    /// Pacer seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Pacer with a fixed seed, for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for TokioPacer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Pacer for TokioPacer {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    fn jitter(&self, upper: Duration) -> Duration {
        sample_jitter(&mut *self.rng.lock(), upper)
    }
}
