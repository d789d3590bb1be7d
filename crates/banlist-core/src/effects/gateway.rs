//! Guild gateway effect trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{BanFailure, BanlistResult};
use crate::types::{ChannelId, Guild, GuildId, UserId};

/// A single ban to issue. The gateway never deletes message history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRequest {
    /// Guild issuing the ban
    pub guild_id: GuildId,
    /// Identity to ban
    pub user_id: UserId,
    /// Audit-log reason
    pub reason: String,
    /// Seconds of message history to delete; always zero
    pub delete_message_seconds: u32,
}

impl BanRequest {
    /// A ban with zero message deletion.
    pub fn new(guild_id: GuildId, user_id: UserId, reason: impl Into<String>) -> Self {
        Self {
            guild_id,
            user_id,
            reason: reason.into(),
            delete_message_seconds: 0,
        }
    }
}

/// The chat platform as seen by the bot account.
///
/// The trait has no unban operation.
#[async_trait]
pub trait GuildGateway: Send + Sync {
    /// Resolve a guild handle; `None` when the bot is not in the guild.
    async fn resolve_guild(&self, guild: GuildId) -> BanlistResult<Option<Guild>>;

    /// Ids of every guild the bot is currently a member of. Handles are not
    /// resolved; callers resolve only the guilds they need.
    async fn joined_guild_ids(&self) -> BanlistResult<Vec<GuildId>>;

    /// Full ban list of a guild, following pagination to the end.
    async fn list_bans(&self, guild: GuildId) -> BanlistResult<Vec<UserId>>;

    /// Issue a ban, classifying any failure.
    async fn ban(&self, request: &BanRequest) -> Result<(), BanFailure>;

    /// Cache-only membership check. `false` does not prove absence.
    fn is_cached_member(&self, guild: GuildId, user: UserId) -> bool;

    /// `displayName (id)`, or the raw id when the user cannot be resolved.
    async fn display_label(&self, user: UserId) -> String;

    /// Post a message. Failures are logged by the implementation, never returned.
    async fn send_message(&self, channel: ChannelId, content: &str);
}
