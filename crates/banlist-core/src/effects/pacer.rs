//! Pacing effect trait.

use async_trait::async_trait;
use std::time::Duration;

/// Sleeping and jitter sampling.
///
/// The reconciliation engine paces ban attempts and the scheduler desynchronises
/// guilds through this trait, so tests can observe delays without waiting.
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Suspend the current task.
    async fn sleep(&self, duration: Duration);

    /// Sample a uniform delay in `[0, upper)`. Zero when `upper` is zero.
    fn jitter(&self, upper: Duration) -> Duration;
}
