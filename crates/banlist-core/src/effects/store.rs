//! Registry store effect trait.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::config::{GuildConfig, GuildConfigUpdate};
use crate::errors::BanlistResult;
use crate::types::{EnforcementTarget, GuildId, UserId};

/// Durable storage for the global registry and guild configuration.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Create backing tables if the store needs them.
    async fn ensure_schema(&self) -> BanlistResult<()> {
        Ok(())
    }

    /// Every flagged identity in the global registry.
    async fn flagged_identities(&self) -> BanlistResult<HashSet<UserId>>;

    /// Remove one identity. Removing an absent identity is a no-op.
    async fn remove_flagged(&self, user: UserId) -> BanlistResult<()>;

    /// Configuration row for a guild, if one exists.
    async fn guild_config(&self, guild: GuildId) -> BanlistResult<Option<GuildConfig>>;

    /// Create or merge a configuration row and return the stored result.
    async fn upsert_guild_config(&self, update: GuildConfigUpdate) -> BanlistResult<GuildConfig>;

    /// Guilds that are enabled and have a notification channel.
    async fn enforcement_targets(&self) -> BanlistResult<Vec<EnforcementTarget>>;
}
