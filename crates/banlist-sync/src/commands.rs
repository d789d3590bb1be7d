//! Admin command surface
//!
//! Turns administrator actions into configuration updates and scheduler
//! triggers. Callers are responsible for authorisation. Replies are produced
//! by the `Display` impls of the outcome types.

use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};

use banlist_core::{
    BanlistError, BanlistResult, ChannelId, EnforcementContext, Guild, GuildConfig,
    GuildConfigUpdate, GuildId,
};

use crate::engine::ReconciliationResult;
use crate::scheduler::{FleetScheduler, SyncTrigger};

/// A background single-guild pass whose result can be awaited.
#[derive(Debug)]
pub struct SyncTask {
    guild_id: GuildId,
    trigger: SyncTrigger,
    receiver: oneshot::Receiver<BanlistResult<ReconciliationResult>>,
}

impl SyncTask {
    /// Guild being reconciled.
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// What started the pass.
    pub fn trigger(&self) -> SyncTrigger {
        self.trigger
    }

    /// Wait for the pass to finish.
    pub async fn wait(self) -> BanlistResult<ReconciliationResult> {
        self.receiver
            .await
            .map_err(|_| BanlistError::TaskDropped {
                guild_id: self.guild_id,
            })?
    }

    /// Non-blocking check; `None` while the pass is still running.
    pub fn try_result(&mut self) -> Option<BanlistResult<ReconciliationResult>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(BanlistError::TaskDropped {
                guild_id: self.guild_id,
            })),
        }
    }
}

/// Result of `set-channel`.
#[derive(Debug)]
pub struct SetChannelOutcome {
    /// Stored configuration after the update
    pub config: GuildConfig,
    /// First-time configuration on an enabled guild starts a pass
    pub sync: Option<SyncTask>,
}

impl fmt::Display for SetChannelOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.config.notification_channel_id {
            Some(channel) => write!(f, "Info channel set to <#{channel}>."),
            None => write!(f, "Info channel is not set."),
        }
    }
}

/// Result of `enable`.
#[derive(Debug)]
pub struct EnableOutcome {
    /// Stored configuration after the update
    pub config: GuildConfig,
    /// Enabling a configured guild starts a pass
    pub sync: Option<SyncTask>,
}

impl EnableOutcome {
    /// Enabled without a channel: nothing will happen until one is set.
    pub fn is_inert(&self) -> bool {
        self.config.enforcement_enabled && self.config.notification_channel_id.is_none()
    }
}

impl fmt::Display for EnableOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.config.enforcement_enabled {
            "enabled"
        } else {
            "disabled"
        };
        write!(f, "Auto-banning is now {state}.")?;
        if self.is_inert() {
            write!(f, " Set the info channel with `set-channel` to begin enforcement.")?;
        }
        Ok(())
    }
}

/// Reply text for a finished on-demand sync.
pub fn sync_complete_message(result: &ReconciliationResult) -> String {
    let noun = if result.new_bans == 1 { "user" } else { "users" };
    format!(
        "Sync complete. **{} new {noun}** added to the ban list.",
        result.new_bans
    )
}

/// Configuration commands and on-demand syncs.
#[derive(Debug, Clone)]
pub struct AdminCommands {
    ctx: EnforcementContext,
    scheduler: Arc<FleetScheduler>,
}

impl AdminCommands {
    /// Commands backed by `scheduler`.
    pub fn new(ctx: EnforcementContext, scheduler: Arc<FleetScheduler>) -> Self {
        Self { ctx, scheduler }
    }

    /// Set the notification channel.
    ///
    /// The first channel on an already-enabled guild starts a pass for that
    /// guild; otherwise the lazy-start rule is evaluated right away.
    pub async fn set_channel(
        &self,
        guild: &Guild,
        channel: ChannelId,
    ) -> BanlistResult<SetChannelOutcome> {
        let before = self.ctx.store.guild_config(guild.id).await?;
        let update = GuildConfigUpdate::touch(guild.id, guild.owner_id).with_channel(channel);
        let config = self.ctx.store.upsert_guild_config(update).await?;
        info!(guild_id = %guild.id, channel_id = %channel, "Info channel set");

        let first_time = before
            .and_then(|previous| previous.notification_channel_id)
            .is_none();
        let sync = if first_time && config.enforcement_enabled {
            Some(self.spawn(guild.id, SyncTrigger::ChannelConfigured))
        } else {
            self.reevaluate_periodic().await;
            None
        };

        Ok(SetChannelOutcome { config, sync })
    }

    /// Switch enforcement on or off.
    ///
    /// Enabling a guild with a channel starts a pass in the background so the
    /// reply is not held up.
    pub async fn set_enabled(&self, guild: &Guild, enabled: bool) -> BanlistResult<EnableOutcome> {
        let update = GuildConfigUpdate::touch(guild.id, guild.owner_id).with_enabled(enabled);
        let config = self.ctx.store.upsert_guild_config(update).await?;
        info!(guild_id = %guild.id, enabled, "Enforcement toggled");

        let sync = if enabled && config.notification_channel_id.is_some() {
            Some(self.spawn(guild.id, SyncTrigger::Enabled))
        } else {
            self.reevaluate_periodic().await;
            None
        };

        Ok(EnableOutcome { config, sync })
    }

    /// Current configuration, if the guild has a row.
    pub async fn status(&self, guild_id: GuildId) -> BanlistResult<Option<GuildConfig>> {
        self.ctx.store.guild_config(guild_id).await
    }

    /// Start an immediate pass for one guild.
    pub async fn sync_now(&self, guild_id: GuildId) -> BanlistResult<SyncTask> {
        let configured = self
            .ctx
            .store
            .guild_config(guild_id)
            .await?
            .is_some_and(|config| config.notification_channel_id.is_some());
        if !configured {
            return Err(BanlistError::NotConfigured { guild_id });
        }
        Ok(self.spawn(guild_id, SyncTrigger::Manual))
    }

    fn spawn(&self, guild_id: GuildId, trigger: SyncTrigger) -> SyncTask {
        SyncTask {
            guild_id,
            trigger,
            receiver: self.scheduler.spawn_reconcile(guild_id, trigger),
        }
    }

    async fn reevaluate_periodic(&self) {
        if let Err(err) = self.scheduler.start_periodic_if_needed().await {
            warn!(error = %err, "Failed to evaluate periodic loop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(new_bans: usize) -> ReconciliationResult {
        ReconciliationResult {
            new_bans,
            ..ReconciliationResult::empty(GuildId::new(1))
        }
    }

    #[test]
    fn sync_message_pluralises() {
        assert_eq!(
            sync_complete_message(&result(1)),
            "Sync complete. **1 new user** added to the ban list."
        );
        assert_eq!(
            sync_complete_message(&result(0)),
            "Sync complete. **0 new users** added to the ban list."
        );
    }

    #[test]
    fn enable_reply_mentions_missing_channel() {
        let mut config = GuildConfig::new(GuildId::new(1), banlist_core::UserId::new(2));
        config.enforcement_enabled = true;
        let outcome = EnableOutcome { config, sync: None };
        assert!(outcome.is_inert());
        assert_eq!(
            outcome.to_string(),
            "Auto-banning is now enabled. Set the info channel with `set-channel` to begin enforcement."
        );
    }
}
