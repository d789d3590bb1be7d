//! Runtime Lifecycle Tests

#![allow(clippy::unwrap_used)]

use banlist_core::{ChannelId, GuildConfigUpdate, GuildState, RegistryStore};
use banlist_sync::{BanlistRuntime, RuntimeConfig};
use banlist_testkit::{guild, user, Fixture, FIXTURE_OWNER};
use std::sync::Arc;
use std::time::Duration;

/// Enable `guild_id` straight in the store, the way a separate admin
/// process would.
async fn enable_externally(fixture: &Fixture, guild_id: u64, channel: u64) {
    let update = GuildConfigUpdate::touch(guild(guild_id).id, user(FIXTURE_OWNER))
        .with_channel(ChannelId::new(channel))
        .with_enabled(true);
    fixture.store.upsert_guild_config(update).await.unwrap();
}

#[tokio::test]
async fn startup_records_guilds_and_runs_fleet_pass() {
    let fixture = Fixture::new([1, 2]);
    let enabled = fixture.enable_guild(10, 100);
    let fresh = guild(20);
    fixture.gateway.add_guild(fresh.clone());
    let runtime = Arc::new(BanlistRuntime::new(fixture.context(), RuntimeConfig::default()));

    let report = runtime.start().await.unwrap();

    assert_eq!(report.new_bans(), 2);
    let row = fixture.store.guild_config(fresh.id).await.unwrap().unwrap();
    assert_eq!(row.state(), GuildState::Unconfigured);
    assert_eq!(row.owner_id, user(FIXTURE_OWNER));
    assert!(fixture.gateway.ban_requests(fresh.id).is_empty());
    assert_eq!(fixture.gateway.banned(enabled.id).len(), 2);
    assert!(runtime.scheduler().is_periodic_running());
    runtime.shutdown();
}

#[tokio::test]
async fn startup_without_targets_leaves_loop_stopped() {
    let fixture = Fixture::new([1]);
    fixture.gateway.add_guild(guild(10));
    let runtime = BanlistRuntime::new(fixture.context(), RuntimeConfig::default());

    let report = runtime.start().await.unwrap();

    assert!(report.results.is_empty());
    assert!(!runtime.scheduler().is_periodic_running());
}

#[tokio::test]
async fn polling_detects_new_guilds_once() {
    let fixture = Fixture::new([1]);
    fixture.gateway.add_guild(guild(10));
    let runtime = BanlistRuntime::new(fixture.context(), RuntimeConfig::default());
    runtime.start().await.unwrap();

    let joined = guild(30);
    fixture.gateway.add_guild(joined.clone());

    assert_eq!(runtime.poll_guild_joins().await.unwrap(), vec![joined.id]);
    assert!(runtime.poll_guild_joins().await.unwrap().is_empty());

    let row = fixture.store.guild_config(joined.id).await.unwrap().unwrap();
    assert!(!row.enforcement_enabled);
    assert!(fixture.gateway.ban_requests(joined.id).is_empty());
}

#[tokio::test]
async fn joining_keeps_existing_configuration() {
    let fixture = Fixture::new([1]);
    let g = fixture.enable_guild(10, 100);
    let runtime = BanlistRuntime::new(fixture.context(), RuntimeConfig::default());

    runtime.on_guild_join(&g).await.unwrap();

    let row = fixture.store.guild_config(g.id).await.unwrap().unwrap();
    assert_eq!(row.state(), GuildState::ConfiguredEnabled);
    assert!(runtime.scheduler().is_periodic_running());
    runtime.shutdown();
}

#[tokio::test]
async fn polling_resolves_only_unseen_guilds() {
    let fixture = Fixture::new([1]);
    fixture.gateway.add_guild(guild(10));
    fixture.gateway.add_guild(guild(20));
    let runtime = BanlistRuntime::new(fixture.context(), RuntimeConfig::default());
    runtime.start().await.unwrap();

    fixture.gateway.add_guild(guild(30));
    runtime.poll_guild_joins().await.unwrap();
    runtime.poll_guild_joins().await.unwrap();

    assert_eq!(fixture.gateway.resolve_count(guild(10).id), 1);
    assert_eq!(fixture.gateway.resolve_count(guild(20).id), 1);
    assert_eq!(fixture.gateway.resolve_count(guild(30).id), 1);
}

#[tokio::test]
async fn unresolvable_guild_does_not_fail_startup() {
    let fixture = Fixture::new([1]);
    fixture.gateway.add_guild(guild(10));
    fixture.gateway.add_guild(guild(20));
    fixture.gateway.fail_resolve(guild(20).id);
    let runtime = BanlistRuntime::new(fixture.context(), RuntimeConfig::default());

    runtime.start().await.unwrap();
    assert!(fixture.store.guild_config(guild(10).id).await.unwrap().is_some());
    assert!(fixture.store.guild_config(guild(20).id).await.unwrap().is_none());

    assert!(runtime.poll_guild_joins().await.unwrap().is_empty());
    assert_eq!(fixture.gateway.resolve_count(guild(20).id), 2);

    fixture.gateway.heal_resolve(guild(20).id);
    assert_eq!(runtime.poll_guild_joins().await.unwrap(), vec![guild(20).id]);
    assert!(fixture.store.guild_config(guild(20).id).await.unwrap().is_some());
}

#[tokio::test]
async fn poll_starts_loop_for_guild_enabled_elsewhere() {
    let fixture = Fixture::new([1]);
    fixture.gateway.add_guild(guild(10));
    let runtime = BanlistRuntime::new(fixture.context(), RuntimeConfig::default());
    runtime.start().await.unwrap();
    assert!(!runtime.scheduler().is_periodic_running());

    enable_externally(&fixture, 10, 100).await;

    assert!(runtime.poll_guild_joins().await.unwrap().is_empty());
    assert!(runtime.scheduler().is_periodic_running());
    runtime.shutdown();
}

#[tokio::test(start_paused = true)]
async fn join_watcher_starts_loop_for_guild_enabled_elsewhere() {
    let fixture = Fixture::new([1]);
    fixture.gateway.add_guild(guild(10));
    let config = RuntimeConfig {
        join_poll_interval: Some(Duration::from_secs(300)),
        ..RuntimeConfig::default()
    };
    let runtime = Arc::new(BanlistRuntime::new(fixture.context(), config));
    runtime.start().await.unwrap();
    let watcher = runtime.spawn_join_watcher().unwrap();

    enable_externally(&fixture, 10, 100).await;
    tokio::time::sleep(Duration::from_secs(299)).await;
    assert_eq!(watcher.passes(), 0);
    assert!(!runtime.scheduler().is_periodic_running());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(watcher.passes(), 1);
    assert!(runtime.scheduler().is_periodic_running());
    runtime.shutdown();
}

#[tokio::test]
async fn join_watcher_is_off_without_interval() {
    let fixture = Fixture::new([1]);
    let runtime = Arc::new(BanlistRuntime::new(fixture.context(), RuntimeConfig::default()));
    assert!(runtime.spawn_join_watcher().is_none());
}
