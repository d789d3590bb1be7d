//! Runtime context
//!
//! `BanlistRuntime` is built once at startup from an `EnforcementContext` and
//! torn down with `shutdown`. It owns the engine, the scheduler, the admin
//! commands and the task registry every background pass runs on.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use banlist_core::{BanlistResult, EnforcementContext, Guild, GuildConfigUpdate, GuildId};

use crate::commands::AdminCommands;
use crate::config::RuntimeConfig;
use crate::engine::ReconciliationEngine;
use crate::scheduler::{FleetReport, FleetScheduler};
use crate::tasks::{FirstRun, LoopHandle, TaskRegistry};

/// Process-wide enforcement context.
#[derive(Debug)]
pub struct BanlistRuntime {
    ctx: EnforcementContext,
    config: RuntimeConfig,
    scheduler: Arc<FleetScheduler>,
    commands: AdminCommands,
    tasks: Arc<TaskRegistry>,
    known_guilds: Mutex<HashSet<GuildId>>,
}

impl BanlistRuntime {
    /// Wire the engine, scheduler and commands over `ctx`.
    pub fn new(ctx: EnforcementContext, config: RuntimeConfig) -> Self {
        let tasks = Arc::new(TaskRegistry::new());
        let engine = ReconciliationEngine::new(ctx.clone(), config.engine.clone());
        let scheduler = Arc::new(FleetScheduler::new(
            ctx.clone(),
            engine,
            config.scheduler.clone(),
            Arc::clone(&tasks),
        ));
        let commands = AdminCommands::new(ctx.clone(), Arc::clone(&scheduler));
        Self {
            ctx,
            config,
            scheduler,
            commands,
            tasks,
            known_guilds: Mutex::new(HashSet::new()),
        }
    }

    /// Admin command surface.
    pub fn commands(&self) -> &AdminCommands {
        &self.commands
    }

    /// Fleet scheduler.
    pub fn scheduler(&self) -> &Arc<FleetScheduler> {
        &self.scheduler
    }

    /// Startup trigger: ensure a row for every joined guild, run one fleet
    /// pass, then evaluate the lazy-start rule.
    ///
    /// Guilds that cannot be resolved are logged and left for the join
    /// watcher to pick up. A failed fleet pass is logged and does not fail
    /// startup.
    pub async fn start(&self) -> BanlistResult<FleetReport> {
        self.ctx.store.ensure_schema().await?;

        let joined = self.ctx.gateway.joined_guild_ids().await?;
        let mut recorded = 0;
        for guild_id in &joined {
            if let Some(guild) = self.resolve_joined(*guild_id).await {
                self.record_guild(&guild).await?;
                recorded += 1;
            }
        }
        info!(guilds = joined.len(), recorded, "Guild rows ensured");

        let report = match self.scheduler.reconcile_fleet().await {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "Startup fleet pass failed");
                FleetReport::default()
            }
        };
        self.scheduler.start_periodic_if_needed().await?;
        Ok(report)
    }

    /// Guild-join trigger: ensure a row exists and evaluate the lazy-start
    /// rule. Nothing is reconciled until the guild is enabled and configured.
    pub async fn on_guild_join(&self, guild: &Guild) -> BanlistResult<()> {
        self.record_guild(guild).await?;
        info!(guild_id = %guild.id, name = %guild.name, "Joined guild");
        self.scheduler.start_periodic_if_needed().await?;
        Ok(())
    }

    /// One join-watcher tick.
    ///
    /// Lists the joined guild ids, resolves only the ones not seen before and
    /// runs the join trigger for each. Guilds that fail to resolve are retried
    /// on the next tick. The lazy-start rule is evaluated on every tick, so
    /// guilds enabled by a separate admin process start the periodic loop
    /// here. Returns the newly joined guilds.
    pub async fn poll_guild_joins(&self) -> BanlistResult<Vec<GuildId>> {
        let unseen: Vec<GuildId> = {
            let joined = self.ctx.gateway.joined_guild_ids().await?;
            let known = self.known_guilds.lock();
            joined
                .into_iter()
                .filter(|guild_id| !known.contains(guild_id))
                .collect()
        };

        let mut fresh = Vec::with_capacity(unseen.len());
        for guild_id in unseen {
            if let Some(guild) = self.resolve_joined(guild_id).await {
                self.on_guild_join(&guild).await?;
                fresh.push(guild_id);
            }
        }
        self.scheduler.start_periodic_if_needed().await?;
        Ok(fresh)
    }

    async fn resolve_joined(&self, guild_id: GuildId) -> Option<Guild> {
        match self.ctx.gateway.resolve_guild(guild_id).await {
            Ok(Some(guild)) => Some(guild),
            Ok(None) => {
                debug!(guild_id = %guild_id, "Joined guild not resolvable; skipping");
                None
            }
            Err(err) => {
                warn!(guild_id = %guild_id, error = %err, "Failed to resolve joined guild");
                None
            }
        }
    }

    async fn record_guild(&self, guild: &Guild) -> BanlistResult<()> {
        self.ctx
            .store
            .upsert_guild_config(GuildConfigUpdate::touch(guild.id, guild.owner_id))
            .await?;
        self.known_guilds.lock().insert(guild.id);
        Ok(())
    }

    /// Poll for joined guilds on the configured interval until shutdown.
    /// The first poll runs one interval after the call, since `start` has
    /// just listed the guilds.
    pub fn spawn_join_watcher(self: &Arc<Self>) -> Option<LoopHandle> {
        let Some(interval) = self.config.join_poll_interval else {
            debug!("Guild join polling disabled");
            return None;
        };
        let runtime = Arc::clone(self);
        self.tasks.spawn_loop(
            "guild-join-watch",
            interval,
            FirstRun::AfterInterval,
            move || {
                let runtime = Arc::clone(&runtime);
                async move {
                    if let Err(err) = runtime.poll_guild_joins().await {
                        warn!(error = %err, "Guild join poll failed");
                    }
                }
            },
        )
    }

    /// Join polling interval, if enabled.
    pub fn join_poll_interval(&self) -> Option<Duration> {
        self.config.join_poll_interval
    }

    /// Cancel every background task.
    pub fn shutdown(&self) {
        info!("Shutting down enforcement runtime");
        self.tasks.shutdown();
    }
}
