//! In-memory registry store
//!
//! Holds the registry and guild rows behind `parking_lot` locks. Locks are
//! never held across `.await`.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};

use banlist_core::{
    BanlistResult, EnforcementTarget, GuildConfig, GuildConfigUpdate, GuildId, RegistryStore,
    UserId,
};

/// Process-local registry store.
#[derive(Debug, Default)]
pub struct MemoryRegistryStore {
    flagged: RwLock<HashSet<UserId>>,
    guilds: RwLock<BTreeMap<GuildId, GuildConfig>>,
}

impl MemoryRegistryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with flagged identities.
    pub fn with_flagged(users: impl IntoIterator<Item = UserId>) -> Self {
        let store = Self::new();
        store.flagged.write().extend(users);
        store
    }

    /// Seed a guild row directly.
    pub fn insert_guild(&self, config: GuildConfig) {
        self.guilds.write().insert(config.guild_id, config);
    }

    /// Whether `user` is currently flagged.
    pub fn is_flagged(&self, user: UserId) -> bool {
        self.flagged.read().contains(&user)
    }

    /// Number of flagged identities.
    pub fn flagged_count(&self) -> usize {
        self.flagged.read().len()
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistryStore {
    async fn flagged_identities(&self) -> BanlistResult<HashSet<UserId>> {
        Ok(self.flagged.read().clone())
    }

    async fn remove_flagged(&self, user: UserId) -> BanlistResult<()> {
        self.flagged.write().remove(&user);
        Ok(())
    }

    async fn guild_config(&self, guild: GuildId) -> BanlistResult<Option<GuildConfig>> {
        Ok(self.guilds.read().get(&guild).cloned())
    }

    async fn upsert_guild_config(&self, update: GuildConfigUpdate) -> BanlistResult<GuildConfig> {
        let mut guilds = self.guilds.write();
        let row = guilds
            .entry(update.guild_id)
            .and_modify(|existing| existing.merge(&update))
            .or_insert_with(|| GuildConfig::from_update(&update));
        Ok(row.clone())
    }

    async fn enforcement_targets(&self) -> BanlistResult<Vec<EnforcementTarget>> {
        Ok(self
            .guilds
            .read()
            .values()
            .filter_map(GuildConfig::enforcement_target)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banlist_core::ChannelId;

    #[tokio::test]
    async fn upsert_creates_then_merges() {
        let store = MemoryRegistryStore::new();
        let guild = GuildId::new(1);

        let created = store
            .upsert_guild_config(GuildConfigUpdate::touch(guild, UserId::new(9)))
            .await
            .unwrap();
        assert!(created.notification_channel_id.is_none());

        store
            .upsert_guild_config(
                GuildConfigUpdate::touch(guild, UserId::new(9)).with_channel(ChannelId::new(3)),
            )
            .await
            .unwrap();
        let merged = store
            .upsert_guild_config(GuildConfigUpdate::touch(guild, UserId::new(9)).with_enabled(true))
            .await
            .unwrap();

        assert_eq!(merged.notification_channel_id, Some(ChannelId::new(3)));
        assert!(merged.enforcement_enabled);
    }

    #[tokio::test]
    async fn targets_require_channel_and_enablement() {
        let store = MemoryRegistryStore::new();
        let mut enabled_no_channel = GuildConfig::new(GuildId::new(1), UserId::new(1));
        enabled_no_channel.enforcement_enabled = true;
        let mut configured = GuildConfig::new(GuildId::new(2), UserId::new(1));
        configured.enforcement_enabled = true;
        configured.notification_channel_id = Some(ChannelId::new(20));
        let mut disabled = GuildConfig::new(GuildId::new(3), UserId::new(1));
        disabled.notification_channel_id = Some(ChannelId::new(30));

        store.insert_guild(enabled_no_channel);
        store.insert_guild(configured);
        store.insert_guild(disabled);

        let targets = store.enforcement_targets().await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].guild_id, GuildId::new(2));
    }

    #[tokio::test]
    async fn removal_is_idempotent() {
        let store = MemoryRegistryStore::with_flagged([UserId::new(5)]);
        store.remove_flagged(UserId::new(5)).await.unwrap();
        store.remove_flagged(UserId::new(5)).await.unwrap();
        assert_eq!(store.flagged_count(), 0);
    }
}
