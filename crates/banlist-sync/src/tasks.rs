//! Background work owned by the runtime
//!
//! Two shapes of task run here: one-off jobs (a single-guild sync started by
//! an admin command) and recurring loops (the fleet loop, the join watcher).
//! Both stop at `shutdown`, including in the middle of a pass, and nothing
//! new is started once the registry has shut down.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// When a loop runs its first pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstRun {
    /// Right away, then every interval
    Immediately,
    /// One full interval after spawning
    AfterInterval,
}

/// Observes a running loop.
#[derive(Debug, Clone)]
pub struct LoopHandle {
    label: &'static str,
    passes: Arc<AtomicU64>,
}

impl LoopHandle {
    /// Name given at spawn time.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Passes that ran to completion.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }
}

/// Owns every background task spawned by the runtime.
#[derive(Debug)]
pub struct TaskRegistry {
    stop: watch::Sender<bool>,
    running: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            stop: watch::Sender::new(false),
            running: Mutex::new(Vec::new()),
        }
    }

    /// Run `job` once. Returns `false`, dropping the job, if the registry
    /// has already shut down.
    pub fn spawn_job<F>(&self, label: &'static str, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_shut_down() {
            debug!(task = label, "Registry shut down; job not started");
            return false;
        }
        let mut stop = self.stop.subscribe();
        self.track(tokio::spawn(async move {
            tokio::select! {
                _ = stopped(&mut stop) => debug!(task = label, "Job cancelled"),
                _ = job => {}
            }
        }));
        true
    }

    /// Run `pass` every `every` until shutdown.
    ///
    /// Ticks missed while a pass is running are not replayed: the next pass
    /// starts a full interval after the previous one finished. Returns `None`
    /// if the registry has already shut down.
    pub fn spawn_loop<F, Fut>(
        &self,
        label: &'static str,
        every: Duration,
        first: FirstRun,
        mut pass: F,
    ) -> Option<LoopHandle>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_shut_down() {
            debug!(task = label, "Registry shut down; loop not started");
            return None;
        }
        let handle = LoopHandle {
            label,
            passes: Arc::new(AtomicU64::new(0)),
        };
        let passes = Arc::clone(&handle.passes);
        let mut stop = self.stop.subscribe();

        self.track(tokio::spawn(async move {
            let start = match first {
                FirstRun::Immediately => Instant::now(),
                FirstRun::AfterInterval => Instant::now() + every,
            };
            let mut ticker = tokio::time::interval_at(start, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stopped(&mut stop) => break,
                    _ = async {
                        ticker.tick().await;
                        pass().await;
                        ticker.reset();
                    } => {
                        passes.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
            debug!(task = label, "Loop stopped");
        }));
        Some(handle)
    }

    /// Stop every task and refuse new ones.
    pub fn shutdown(&self) {
        self.stop.send_replace(true);
        for handle in self.running.lock().drain(..) {
            handle.abort();
        }
    }

    /// Whether `shutdown` has been called.
    pub fn is_shut_down(&self) -> bool {
        *self.stop.borrow()
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut running = self.running.lock();
        running.retain(|h| !h.is_finished());
        running.push(handle);
    }
}

/// Resolves once shutdown has been signalled, even if that happened before
/// the receiver was created.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}
