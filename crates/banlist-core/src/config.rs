//! Per-guild configuration
//!
//! One `GuildConfig` row exists per guild the bot has joined. Rows are created
//! on first contact, mutated by admin commands through `GuildConfigUpdate`,
//! and never deleted while the bot stays in the guild.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ChannelId, EnforcementTarget, GuildId, UserId};

/// Stored configuration for one guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    /// Guild this row belongs to
    pub guild_id: GuildId,
    /// Owner recorded at last contact
    pub owner_id: UserId,
    /// Where enforcement notices are posted
    pub notification_channel_id: Option<ChannelId>,
    /// Whether automatic banning is switched on
    pub enforcement_enabled: bool,
}

/// Lifecycle of a guild's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuildState {
    /// No channel and enforcement off
    Unconfigured,
    /// Enforcement switched on but no channel yet; never targeted
    EnabledUnconfigured,
    /// Channel set, enforcement off
    ConfiguredDisabled,
    /// Channel set, enforcement on; the only state the scheduler targets
    ConfiguredEnabled,
}

impl GuildConfig {
    /// A fresh row: no channel, enforcement disabled.
    pub fn new(guild_id: GuildId, owner_id: UserId) -> Self {
        Self {
            guild_id,
            owner_id,
            notification_channel_id: None,
            enforcement_enabled: false,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GuildState {
        match (self.notification_channel_id.is_some(), self.enforcement_enabled) {
            (false, false) => GuildState::Unconfigured,
            (false, true) => GuildState::EnabledUnconfigured,
            (true, false) => GuildState::ConfiguredDisabled,
            (true, true) => GuildState::ConfiguredEnabled,
        }
    }

    /// The scheduler target for this guild, if it participates in enforcement.
    pub fn enforcement_target(&self) -> Option<EnforcementTarget> {
        match (self.enforcement_enabled, self.notification_channel_id) {
            (true, Some(channel_id)) => Some(EnforcementTarget {
                guild_id: self.guild_id,
                channel_id,
            }),
            _ => None,
        }
    }

    /// Apply an update. Absent fields keep their stored value; the owner is
    /// always refreshed.
    pub fn merge(&mut self, update: &GuildConfigUpdate) {
        self.owner_id = update.owner_id;
        if let Some(channel) = update.notification_channel_id {
            self.notification_channel_id = Some(channel);
        }
        if let Some(enabled) = update.enforcement_enabled {
            self.enforcement_enabled = enabled;
        }
    }

    /// Build the row an upsert creates when none exists yet.
    pub fn from_update(update: &GuildConfigUpdate) -> Self {
        let mut config = Self::new(update.guild_id, update.owner_id);
        config.merge(update);
        config
    }
}

impl fmt::Display for GuildConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Enabled: {}", self.enforcement_enabled)?;
        match self.notification_channel_id {
            Some(channel) => write!(f, "Info channel: <#{channel}>"),
            None => write!(f, "Info channel: Not set"),
        }
    }
}

/// Upsert request for a guild row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfigUpdate {
    /// Guild to create or update
    pub guild_id: GuildId,
    /// Owner to record
    pub owner_id: UserId,
    /// New channel, or `None` to keep the stored one
    pub notification_channel_id: Option<ChannelId>,
    /// New enablement, or `None` to keep the stored one
    pub enforcement_enabled: Option<bool>,
}

impl GuildConfigUpdate {
    /// An update that only ensures the row exists and refreshes the owner.
    pub fn touch(guild_id: GuildId, owner_id: UserId) -> Self {
        Self {
            guild_id,
            owner_id,
            notification_channel_id: None,
            enforcement_enabled: None,
        }
    }

    /// Set the notification channel.
    pub fn with_channel(mut self, channel: ChannelId) -> Self {
        self.notification_channel_id = Some(channel);
        self
    }

    /// Set enablement.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enforcement_enabled = Some(enabled);
        self
    }
}
