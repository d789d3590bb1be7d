//! Command handlers
//!
//! Each handler wires the production effects into a `BanlistRuntime` and
//! prints its reply on stdout.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tracing::info;

use banlist_core::{ChannelId, EnforcementContext, Guild, GuildId, RegistryStore};
use banlist_effects::{PostgresRegistryStore, RestGateway, TokioPacer};
use banlist_sync::{sync_complete_message, BanlistRuntime, RuntimeConfig, SyncTask};

use crate::config::Settings;

/// Connect the store and gateway described by `settings`.
pub async fn connect(settings: &Settings) -> Result<EnforcementContext> {
    let store = PostgresRegistryStore::connect(&settings.database_url, settings.max_connections)
        .await
        .context("Failed to connect to the registry database")?;
    store.ensure_schema().await?;
    let gateway = RestGateway::new(settings.rest.clone())?;
    Ok(EnforcementContext::new(
        Arc::new(store),
        Arc::new(gateway),
        Arc::new(TokioPacer::new()),
    ))
}

/// Run the daemon until interrupted.
pub async fn run_daemon(settings: Settings) -> Result<()> {
    let ctx = connect(&settings).await?;
    let runtime = Arc::new(BanlistRuntime::new(ctx, settings.runtime));

    let report = runtime.start().await?;
    info!(
        guilds = report.results.len(),
        new_bans = report.new_bans(),
        "Startup enforcement complete"
    );
    if let Some(watcher) = runtime.spawn_join_watcher() {
        info!(task = watcher.label(), "Watching for newly joined guilds");
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    runtime.shutdown();
    Ok(())
}

/// Run a single fleet pass and exit.
pub async fn run_fleet_once(settings: Settings) -> Result<()> {
    let runtime = one_shot_runtime(connect(&settings).await?, settings.runtime);
    let report = runtime.start().await?;
    for result in &report.results {
        println!(
            "{}: {} new, {} conflicts, {} removed from registry, {} failed{}",
            result.guild_id,
            result.new_bans,
            result.conflicts,
            result.self_healed,
            result.failed,
            if result.aborted { " (missing permission)" } else { "" }
        );
    }
    for guild in &report.skipped {
        println!("{guild}: skipped (not reachable)");
    }
    println!("Fleet pass complete: {} new bans", report.new_bans());
    runtime.shutdown();
    Ok(())
}

/// An admin command against one guild.
#[derive(Debug, Clone, Copy)]
pub enum AdminAction {
    /// `set-channel`
    SetChannel(ChannelId),
    /// `enable` / `disable`
    SetEnabled(bool),
    /// `status`
    Status,
    /// `sync-now`
    SyncNow,
}

/// Run an admin command and wait for any sync it starts.
pub async fn run_admin(settings: Settings, guild_id: GuildId, action: AdminAction) -> Result<()> {
    let ctx = connect(&settings).await?;
    let runtime = one_shot_runtime(ctx.clone(), settings.runtime);
    let commands = runtime.commands();

    match action {
        AdminAction::SetChannel(channel) => {
            let guild = resolve(&ctx, guild_id).await?;
            let outcome = commands.set_channel(&guild, channel).await?;
            println!("{outcome}");
            await_sync(outcome.sync).await?;
        }
        AdminAction::SetEnabled(enabled) => {
            let guild = resolve(&ctx, guild_id).await?;
            let outcome = commands.set_enabled(&guild, enabled).await?;
            println!("{outcome}");
            await_sync(outcome.sync).await?;
        }
        AdminAction::Status => match commands.status(guild_id).await? {
            Some(config) => println!("{config}"),
            None => println!("No configuration stored for guild {guild_id}"),
        },
        AdminAction::SyncNow => {
            let task = commands.sync_now(guild_id).await?;
            println!("Starting manual ban sync...");
            await_sync(Some(task)).await?;
        }
    }

    runtime.shutdown();
    Ok(())
}

fn one_shot_runtime(ctx: EnforcementContext, mut config: RuntimeConfig) -> BanlistRuntime {
    config.scheduler.periodic_enabled = false;
    config.join_poll_interval = None;
    BanlistRuntime::new(ctx, config)
}

async fn resolve(ctx: &EnforcementContext, guild_id: GuildId) -> Result<Guild> {
    ctx.gateway
        .resolve_guild(guild_id)
        .await?
        .ok_or_else(|| anyhow!("Guild {guild_id} is not reachable by the bot"))
}

async fn await_sync(task: Option<SyncTask>) -> Result<()> {
    if let Some(task) = task {
        let result = task.wait().await?;
        println!("{}", sync_complete_message(&result));
    }
    Ok(())
}
