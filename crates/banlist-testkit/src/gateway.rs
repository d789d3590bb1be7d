//! Scripted in-memory gateway.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};

use banlist_core::{
    BanFailure, BanRequest, BanlistError, BanlistResult, ChannelId, Guild, GuildGateway, GuildId,
    UserId,
};

/// Every gateway interaction, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    /// `resolve_guild`
    ResolveGuild(GuildId),
    /// `joined_guild_ids`
    JoinedGuildIds,
    /// `list_bans`
    ListBans(GuildId),
    /// `ban`
    Ban(BanRequest),
    /// `display_label`
    DisplayLabel(UserId),
    /// `send_message`
    SendMessage {
        /// Target channel
        channel: ChannelId,
        /// Message text
        content: String,
    },
}

/// Gateway double that behaves like the platform: bans stick, a second ban of
/// the same identity is a conflict, and banned members leave the cache.
#[derive(Debug, Default)]
pub struct MockGateway {
    guilds: RwLock<BTreeMap<GuildId, Guild>>,
    bans: RwLock<HashMap<GuildId, HashSet<UserId>>>,
    members: RwLock<HashSet<(GuildId, UserId)>>,
    labels: RwLock<HashMap<UserId, String>>,
    scripted: RwLock<HashMap<(GuildId, UserId), BanFailure>>,
    failing_ban_lists: RwLock<HashSet<GuildId>>,
    failing_resolves: RwLock<HashSet<GuildId>>,
    calls: Mutex<Vec<GatewayCall>>,
}

impl MockGateway {
    /// Empty platform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a guild resolvable and joined.
    pub fn add_guild(&self, guild: Guild) {
        self.guilds.write().insert(guild.id, guild);
    }

    /// Remove a guild, as if the bot was kicked.
    pub fn remove_guild(&self, guild: GuildId) {
        self.guilds.write().remove(&guild);
    }

    /// Pre-existing platform-side bans.
    pub fn preban(&self, guild: GuildId, users: impl IntoIterator<Item = UserId>) {
        self.bans.write().entry(guild).or_default().extend(users);
    }

    /// Put `user` in the membership cache of `guild`.
    pub fn add_member(&self, guild: GuildId, user: UserId, label: impl Into<String>) {
        self.members.write().insert((guild, user));
        self.labels.write().insert(user, label.into());
    }

    /// Every ban of `user` in `guild` fails with `failure`.
    pub fn fail_ban(&self, guild: GuildId, user: UserId, failure: BanFailure) {
        self.scripted.write().insert((guild, user), failure);
    }

    /// Fetching the ban list of `guild` fails.
    pub fn fail_ban_list(&self, guild: GuildId) {
        self.failing_ban_lists.write().insert(guild);
    }

    /// Resolving `guild` fails; the guild still shows up as joined.
    pub fn fail_resolve(&self, guild: GuildId) {
        self.failing_resolves.write().insert(guild);
    }

    /// Undo [`MockGateway::fail_resolve`].
    pub fn heal_resolve(&self, guild: GuildId) {
        self.failing_resolves.write().remove(&guild);
    }

    /// Number of `resolve_guild` calls recorded for `guild`.
    pub fn resolve_count(&self, guild: GuildId) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, GatewayCall::ResolveGuild(g) if *g == guild))
            .count()
    }

    /// Current platform-side bans of a guild.
    pub fn banned(&self, guild: GuildId) -> HashSet<UserId> {
        self.bans.read().get(&guild).cloned().unwrap_or_default()
    }

    /// All recorded calls.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    /// Recorded ban requests for one guild.
    pub fn ban_requests(&self, guild: GuildId) -> Vec<BanRequest> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Ban(request) if request.guild_id == guild => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Messages posted to a channel.
    pub fn messages(&self, channel: ChannelId) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                GatewayCall::SendMessage { channel: c, content } if *c == channel => {
                    Some(content.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Forget recorded calls, keeping platform state.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl GuildGateway for MockGateway {
    async fn resolve_guild(&self, guild: GuildId) -> BanlistResult<Option<Guild>> {
        self.record(GatewayCall::ResolveGuild(guild));
        if self.failing_resolves.read().contains(&guild) {
            return Err(BanlistError::gateway("HTTP 503"));
        }
        Ok(self.guilds.read().get(&guild).cloned())
    }

    async fn joined_guild_ids(&self) -> BanlistResult<Vec<GuildId>> {
        self.record(GatewayCall::JoinedGuildIds);
        Ok(self.guilds.read().keys().copied().collect())
    }

    async fn list_bans(&self, guild: GuildId) -> BanlistResult<Vec<UserId>> {
        self.record(GatewayCall::ListBans(guild));
        if self.failing_ban_lists.read().contains(&guild) {
            return Err(BanlistError::gateway("ban list unavailable"));
        }
        let snapshot = self.banned(guild).into_iter().collect();
        // Let concurrent passes observe the same snapshot.
        tokio::task::yield_now().await;
        Ok(snapshot)
    }

    async fn ban(&self, request: &BanRequest) -> Result<(), BanFailure> {
        self.record(GatewayCall::Ban(request.clone()));
        if let Some(failure) = self
            .scripted
            .read()
            .get(&(request.guild_id, request.user_id))
        {
            return Err(failure.clone());
        }
        let mut bans = self.bans.write();
        let banned = bans.entry(request.guild_id).or_default();
        if !banned.insert(request.user_id) {
            return Err(BanFailure::conflict("already banned"));
        }
        self.members
            .write()
            .remove(&(request.guild_id, request.user_id));
        Ok(())
    }

    fn is_cached_member(&self, guild: GuildId, user: UserId) -> bool {
        self.members.read().contains(&(guild, user))
    }

    async fn display_label(&self, user: UserId) -> String {
        self.record(GatewayCall::DisplayLabel(user));
        match self.labels.read().get(&user) {
            Some(name) => format!("{name} ({user})"),
            None => user.to_string(),
        }
    }

    async fn send_message(&self, channel: ChannelId, content: &str) {
        self.record(GatewayCall::SendMessage {
            channel,
            content: content.to_string(),
        });
    }
}
