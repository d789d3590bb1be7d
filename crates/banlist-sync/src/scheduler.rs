//! Fleet Scheduler
//!
//! Decides which guilds are reconciled and when:
//! - a full fleet pass over every enabled-and-configured guild, sequential,
//!   with a random `[0, guild_jitter)` pause before each guild
//! - a periodic loop running a fleet pass every `fleet_interval`, each pass
//!   preceded by a random `[0, periodic_jitter)` pause
//! - single-guild passes for configuration triggers and on-demand requests
//!
//! The periodic loop starts lazily, once at least one guild participates.
//! Passes on the same guild are serialised by a per-guild lock, so an
//! on-demand sync never interleaves with a scheduled one.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use banlist_core::{BanlistError, BanlistResult, EnforcementContext, EnforcementTarget, GuildId};

use crate::config::SchedulerConfig;
use crate::engine::{ReconciliationEngine, ReconciliationResult};
use crate::tasks::{FirstRun, LoopHandle, TaskRegistry};

/// Why a single-guild pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncTrigger {
    /// A channel was configured for the first time on an enabled guild
    ChannelConfigured,
    /// Enforcement was switched on for a configured guild
    Enabled,
    /// An administrator asked for an immediate sync
    Manual,
}

impl SyncTrigger {
    /// Configuration triggers re-evaluate the lazy-start rule afterwards.
    pub fn reevaluates_periodic(self) -> bool {
        matches!(self, Self::ChannelConfigured | Self::Enabled)
    }
}

/// Outcome of a fleet pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetReport {
    /// One entry per reconciled guild, in processing order
    pub results: Vec<ReconciliationResult>,
    /// Targets whose guild handle could not be resolved
    pub skipped: Vec<GuildId>,
    /// Targets that failed before reconciliation started
    pub failed: Vec<GuildId>,
}

impl FleetReport {
    /// Total new bans across the pass.
    pub fn new_bans(&self) -> usize {
        self.results.iter().map(|r| r.new_bans).sum()
    }
}

/// Sequences reconciliation passes across the fleet.
pub struct FleetScheduler {
    ctx: EnforcementContext,
    engine: ReconciliationEngine,
    config: SchedulerConfig,
    tasks: Arc<TaskRegistry>,
    guild_locks: Mutex<HashMap<GuildId, Arc<tokio::sync::Mutex<()>>>>,
    periodic_running: AtomicBool,
    periodic: Mutex<Option<LoopHandle>>,
}

impl std::fmt::Debug for FleetScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetScheduler")
            .field("config", &self.config)
            .field("periodic_running", &self.is_periodic_running())
            .finish_non_exhaustive()
    }
}

impl FleetScheduler {
    /// Scheduler spawning its background work on `tasks`.
    pub fn new(
        ctx: EnforcementContext,
        engine: ReconciliationEngine,
        config: SchedulerConfig,
        tasks: Arc<TaskRegistry>,
    ) -> Self {
        Self {
            ctx,
            engine,
            config,
            tasks,
            guild_locks: Mutex::new(HashMap::new()),
            periodic_running: AtomicBool::new(false),
            periodic: Mutex::new(None),
        }
    }

    /// Scheduler settings.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Whether the periodic loop has been started.
    pub fn is_periodic_running(&self) -> bool {
        self.periodic_running.load(Ordering::SeqCst)
    }

    /// Periodic passes completed so far; zero while the loop is stopped.
    pub fn periodic_passes(&self) -> u64 {
        self.periodic.lock().as_ref().map_or(0, LoopHandle::passes)
    }

    fn guild_lock(&self, guild: GuildId) -> Arc<tokio::sync::Mutex<()>> {
        self.guild_locks.lock().entry(guild).or_default().clone()
    }

    /// Reconcile every enabled-and-configured guild, one after another.
    ///
    /// The desired set is loaded once and shared by every guild in the pass.
    /// Only failing to list targets or identities fails the pass; per-guild
    /// problems are logged and recorded in the report.
    pub async fn reconcile_fleet(&self) -> BanlistResult<FleetReport> {
        let mut report = FleetReport::default();
        let targets = self.ctx.store.enforcement_targets().await?;
        if targets.is_empty() {
            debug!("No enabled and configured guilds");
            return Ok(report);
        }

        let desired = self.ctx.store.flagged_identities().await?;
        if desired.is_empty() {
            debug!("Registry is empty; skipping fleet pass");
            return Ok(report);
        }

        info!(
            identities = desired.len(),
            guilds = targets.len(),
            "Enforcing registry across enabled and configured guilds"
        );

        for EnforcementTarget {
            guild_id,
            channel_id,
        } in targets
        {
            let guild = match self.ctx.gateway.resolve_guild(guild_id).await {
                Ok(Some(guild)) => guild,
                Ok(None) => {
                    debug!(guild_id = %guild_id, "Guild not resolvable; skipping");
                    report.skipped.push(guild_id);
                    continue;
                }
                Err(err) => {
                    error!(guild_id = %guild_id, error = %err, "Error resolving guild during fleet pass");
                    report.failed.push(guild_id);
                    continue;
                }
            };

            let jitter = self.ctx.pacer.jitter(self.config.guild_jitter);
            self.ctx.pacer.sleep(jitter).await;

            let lock = self.guild_lock(guild_id);
            let _guard = lock.lock().await;
            let result = self.engine.reconcile_guild(&guild, &desired, channel_id).await;
            info!(
                guild_id = %guild_id,
                new_bans = result.new_bans,
                aborted = result.aborted,
                "Guild enforcement complete"
            );
            report.results.push(result);
        }

        Ok(report)
    }

    /// Reconcile a single guild using its stored channel.
    ///
    /// Fails with `NotConfigured` when the guild has no channel and with
    /// `GuildUnavailable` when the guild cannot be resolved.
    pub async fn reconcile_one(
        &self,
        guild_id: GuildId,
        trigger: SyncTrigger,
    ) -> BanlistResult<ReconciliationResult> {
        let channel = self
            .ctx
            .store
            .guild_config(guild_id)
            .await?
            .and_then(|config| config.notification_channel_id)
            .ok_or(BanlistError::NotConfigured { guild_id })?;
        let guild = self
            .ctx
            .gateway
            .resolve_guild(guild_id)
            .await?
            .ok_or(BanlistError::GuildUnavailable { guild_id })?;
        let desired = self.ctx.store.flagged_identities().await?;

        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;
        let result = self.engine.reconcile_guild(&guild, &desired, channel).await;
        info!(
            guild_id = %guild_id,
            ?trigger,
            new_bans = result.new_bans,
            aborted = result.aborted,
            "Guild enforcement complete"
        );
        Ok(result)
    }

    /// Start the periodic loop if any guild participates and it is not
    /// running yet. Returns whether the loop is running afterwards.
    pub async fn start_periodic_if_needed(self: &Arc<Self>) -> BanlistResult<bool> {
        if !self.config.periodic_enabled {
            return Ok(false);
        }
        if self.is_periodic_running() {
            return Ok(true);
        }
        if self.ctx.store.enforcement_targets().await?.is_empty() {
            return Ok(false);
        }
        if self
            .periodic_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(true);
        }

        info!(
            interval_secs = self.config.fleet_interval.as_secs(),
            "Starting periodic enforcement loop"
        );
        let scheduler = Arc::clone(self);
        let handle = self.tasks.spawn_loop(
            "fleet-enforcement",
            self.config.fleet_interval,
            FirstRun::Immediately,
            move || {
                let scheduler = Arc::clone(&scheduler);
                async move { scheduler.run_periodic_pass().await }
            },
        );
        let Some(handle) = handle else {
            self.periodic_running.store(false, Ordering::SeqCst);
            return Ok(false);
        };
        *self.periodic.lock() = Some(handle);
        Ok(true)
    }

    async fn run_periodic_pass(&self) {
        let jitter = self.ctx.pacer.jitter(self.config.periodic_jitter);
        info!(jitter_secs = jitter.as_secs(), "Jitter delay before fleet enforcement");
        self.ctx.pacer.sleep(jitter).await;
        match self.reconcile_fleet().await {
            Ok(report) => debug!(
                guilds = report.results.len(),
                new_bans = report.new_bans(),
                "Periodic fleet pass complete"
            ),
            Err(err) => warn!(error = %err, "Periodic fleet pass failed"),
        }
    }

    /// Run a single-guild pass in the background, returning a receiver for
    /// its result. Configuration triggers re-evaluate the lazy-start rule once
    /// the pass has finished. After shutdown nothing runs and the receiver
    /// closes without a result.
    pub fn spawn_reconcile(
        self: &Arc<Self>,
        guild_id: GuildId,
        trigger: SyncTrigger,
    ) -> tokio::sync::oneshot::Receiver<BanlistResult<ReconciliationResult>> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let scheduler = Arc::clone(self);
        let started = self.tasks.spawn_job("guild-sync", async move {
            let result = scheduler.reconcile_one(guild_id, trigger).await;
            if let Err(err) = &result {
                error!(guild_id = %guild_id, ?trigger, error = %err, "Background enforcement failed");
            }
            if trigger.reevaluates_periodic() {
                if let Err(err) = scheduler.start_periodic_if_needed().await {
                    warn!(error = %err, "Failed to evaluate periodic loop");
                }
            }
            let _ = tx.send(result);
        });
        if !started {
            debug!(guild_id = %guild_id, ?trigger, "Runtime shut down; sync not started");
        }
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use banlist_testkit::Fixture;

    fn scheduler(fixture: &Fixture, config: SchedulerConfig) -> Arc<FleetScheduler> {
        let engine = ReconciliationEngine::new(fixture.context(), EngineConfig::default());
        Arc::new(FleetScheduler::new(
            fixture.context(),
            engine,
            config,
            Arc::new(TaskRegistry::new()),
        ))
    }

    #[test]
    fn only_configuration_triggers_reevaluate_periodic() {
        assert!(SyncTrigger::ChannelConfigured.reevaluates_periodic());
        assert!(SyncTrigger::Enabled.reevaluates_periodic());
        assert!(!SyncTrigger::Manual.reevaluates_periodic());
    }

    #[tokio::test]
    async fn lazy_start_requires_a_target() {
        let fixture = Fixture::new([1]);
        let scheduler = scheduler(&fixture, SchedulerConfig::default());

        assert!(!scheduler.start_periodic_if_needed().await.unwrap());
        assert!(!scheduler.is_periodic_running());

        fixture.enable_guild(10, 100);
        assert!(scheduler.start_periodic_if_needed().await.unwrap());
        assert!(scheduler.start_periodic_if_needed().await.unwrap());
        assert!(scheduler.is_periodic_running());
        scheduler.tasks.shutdown();
    }

    #[tokio::test]
    async fn loop_is_not_started_after_shutdown() {
        let fixture = Fixture::new([1]);
        fixture.enable_guild(10, 100);
        let scheduler = scheduler(&fixture, SchedulerConfig::default());
        scheduler.tasks.shutdown();

        assert!(!scheduler.start_periodic_if_needed().await.unwrap());
        assert!(!scheduler.is_periodic_running());
        assert_eq!(scheduler.periodic_passes(), 0);

        let rx = scheduler.spawn_reconcile(GuildId::new(10), SyncTrigger::Manual);
        assert!(rx.await.is_err());
        assert!(fixture.gateway.banned(GuildId::new(10)).is_empty());
    }

    #[tokio::test]
    async fn periodic_loop_can_be_disabled() {
        let fixture = Fixture::new([1]);
        fixture.enable_guild(10, 100);
        let config = SchedulerConfig {
            periodic_enabled: false,
            ..SchedulerConfig::default()
        };
        let scheduler = scheduler(&fixture, config);

        assert!(!scheduler.start_periodic_if_needed().await.unwrap());
        assert!(!scheduler.is_periodic_running());
    }

    #[tokio::test]
    async fn reconcile_one_requires_channel() {
        let fixture = Fixture::new([1]);
        let scheduler = scheduler(&fixture, SchedulerConfig::default());

        let err = scheduler
            .reconcile_one(GuildId::new(10), SyncTrigger::Manual)
            .await
            .unwrap_err();
        assert!(matches!(err, BanlistError::NotConfigured { .. }));
    }
}
