//! Per-guild reconciliation
//!
//! One pass brings a guild's ban list up to the desired set:
//!
//! 1. Fetch the guild's current bans. A failed fetch is treated as an empty
//!    list; the resulting duplicate attempts come back as conflicts.
//! 2. Ban every desired identity that is not already banned, one at a time,
//!    pausing after each attempt.
//! 3. Classify each failure:
//!    - `Permission`: notify the guild once and stop this guild's pass
//!    - `Conflict`: already banned, nothing to do
//!    - `NotFound`: remove the identity from the global registry
//!    - `Transient`: log; the next pass retries
//!
//! Iteration order over the identities to ban is unspecified.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use banlist_core::{
    BanFailure, BanFailureKind, BanRequest, ChannelId, EnforcementContext, Guild, GuildId, UserId,
};

use crate::config::EngineConfig;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// Guild that was reconciled
    pub guild_id: GuildId,
    /// Identities newly added to the guild's ban list
    pub new_bans: usize,
    /// Ban calls issued
    pub attempted: usize,
    /// Attempts the platform reported as duplicates
    pub conflicts: usize,
    /// Identities removed from the registry during this pass
    pub self_healed: usize,
    /// Attempts that failed with a permission or transient error
    pub failed: usize,
    /// Whether the pass stopped early on a permission failure
    pub aborted: bool,
}

impl ReconciliationResult {
    /// A pass that did nothing.
    pub fn empty(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            new_bans: 0,
            attempted: 0,
            conflicts: 0,
            self_healed: 0,
            failed: 0,
            aborted: false,
        }
    }
}

enum Flow {
    Continue,
    Abort,
}

/// Diff-and-apply engine for a single guild.
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    ctx: EnforcementContext,
    config: EngineConfig,
}

impl ReconciliationEngine {
    /// Engine over the given effects.
    pub fn new(ctx: EnforcementContext, config: EngineConfig) -> Self {
        Self { ctx, config }
    }

    /// Engine settings.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ban every identity in `desired` that `guild` has not banned yet.
    ///
    /// Never fails: every error is either absorbed, logged, or recorded in
    /// the result. An empty `desired` set makes no gateway calls.
    pub async fn reconcile_guild(
        &self,
        guild: &Guild,
        desired: &HashSet<UserId>,
        notify_channel: ChannelId,
    ) -> ReconciliationResult {
        let mut result = ReconciliationResult::empty(guild.id);
        if desired.is_empty() {
            debug!(guild_id = %guild.id, "No flagged identities; nothing to ban");
            return result;
        }

        let already_banned: HashSet<UserId> = match self.ctx.gateway.list_bans(guild.id).await {
            Ok(bans) => bans.into_iter().collect(),
            Err(err) => {
                debug!(guild_id = %guild.id, error = %err, "Failed to fetch ban list");
                HashSet::new()
            }
        };

        let to_ban: Vec<UserId> = desired.difference(&already_banned).copied().collect();
        if to_ban.is_empty() {
            debug!(guild_id = %guild.id, "No new bans needed");
            return result;
        }

        for user in to_ban {
            let was_member = self.ctx.gateway.is_cached_member(guild.id, user);
            let request = BanRequest::new(guild.id, user, self.config.ban_reason.as_str());
            result.attempted += 1;

            match self.ctx.gateway.ban(&request).await {
                Ok(()) => {
                    result.new_bans += 1;
                    if was_member {
                        let label = self.ctx.gateway.display_label(user).await;
                        self.ctx
                            .gateway
                            .send_message(notify_channel, &self.config.member_removed_notice(&label))
                            .await;
                    }
                    self.ctx.pacer.sleep(self.config.success_delay).await;
                }
                Err(failure) => {
                    match self
                        .handle_failure(guild.id, notify_channel, user, &failure, &mut result)
                        .await
                    {
                        Flow::Continue => self.ctx.pacer.sleep(self.config.failure_delay).await,
                        Flow::Abort => {
                            result.aborted = true;
                            break;
                        }
                    }
                }
            }
        }

        result
    }

    async fn handle_failure(
        &self,
        guild_id: GuildId,
        notify_channel: ChannelId,
        user: UserId,
        failure: &BanFailure,
        result: &mut ReconciliationResult,
    ) -> Flow {
        match failure.kind {
            BanFailureKind::Permission => {
                result.failed += 1;
                self.ctx
                    .gateway
                    .send_message(notify_channel, &self.config.permission_notice)
                    .await;
                warn!(guild_id = %guild_id, user_id = %user, "Forbidden from banning; stopping guild pass");
                Flow::Abort
            }
            BanFailureKind::Conflict => {
                result.conflicts += 1;
                Flow::Continue
            }
            BanFailureKind::NotFound => {
                info!(
                    guild_id = %guild_id,
                    user_id = %user,
                    "User no longer exists on the platform; removing from registry"
                );
                match self.ctx.store.remove_flagged(user).await {
                    Ok(()) => result.self_healed += 1,
                    Err(err) => {
                        warn!(
                            guild_id = %guild_id,
                            user_id = %user,
                            error = %err,
                            "Failed to remove unknown user from registry"
                        );
                    }
                }
                Flow::Continue
            }
            BanFailureKind::Transient => {
                result.failed += 1;
                debug!(guild_id = %guild_id, user_id = %user, error = %failure.message, "Ban attempt failed");
                Flow::Continue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banlist_testkit::{guild, user, Fixture};
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap_or_else(|e| e.into_inner());
            String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap_or_else(|e| e.into_inner()).extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn engine(fixture: &Fixture) -> ReconciliationEngine {
        ReconciliationEngine::new(fixture.context(), EngineConfig::default())
    }

    #[tokio::test]
    async fn empty_desired_set_makes_no_calls() {
        let fixture = Fixture::new([]);
        let result = engine(&fixture)
            .reconcile_guild(&guild(1), &HashSet::new(), ChannelId::new(9))
            .await;

        assert_eq!(result.new_bans, 0);
        assert!(fixture.gateway.calls().is_empty());
        assert!(fixture.pacer.calls().is_empty());
    }

    #[tokio::test]
    async fn pacing_follows_outcome() {
        let fixture = Fixture::new([1, 2]);
        let g = fixture.enable_guild(10, 100);
        fixture
            .gateway
            .fail_ban(g.id, user(2), BanFailure::transient("HTTP 500"));

        let desired: HashSet<UserId> = [user(1), user(2)].into_iter().collect();
        let result = engine(&fixture)
            .reconcile_guild(&g, &desired, ChannelId::new(100))
            .await;

        assert_eq!(result.new_bans, 1);
        assert_eq!(result.failed, 1);
        let mut sleeps = fixture.pacer.sleeps();
        sleeps.sort();
        assert_eq!(sleeps, vec![Duration::from_millis(200), Duration::from_secs(1)]);
    }

    #[tokio::test]
    async fn ban_list_fetch_failure_degrades_to_conflicts() {
        let fixture = Fixture::new([1, 2]);
        let g = fixture.enable_guild(10, 100);
        fixture.gateway.preban(g.id, [user(1), user(2)]);
        fixture.gateway.fail_ban_list(g.id);

        let desired: HashSet<UserId> = [user(1), user(2)].into_iter().collect();
        let result = engine(&fixture)
            .reconcile_guild(&g, &desired, ChannelId::new(100))
            .await;

        assert_eq!(result.attempted, 2);
        assert_eq!(result.conflicts, 2);
        assert_eq!(result.new_bans, 0);
        assert!(!result.aborted);
    }

    #[tokio::test]
    async fn bans_carry_reason_and_zero_deletion_window() {
        let fixture = Fixture::new([1]);
        let g = fixture.enable_guild(10, 100);
        let desired: HashSet<UserId> = [user(1)].into_iter().collect();
        engine(&fixture)
            .reconcile_guild(&g, &desired, ChannelId::new(100))
            .await;

        let requests = fixture.gateway.ban_requests(g.id);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].delete_message_seconds, 0);
        assert_eq!(requests[0].reason, EngineConfig::default().ban_reason);
    }

    #[tokio::test]
    async fn registry_removal_is_logged_with_guild() {
        let fixture = Fixture::new([1, 2]);
        let g = fixture.enable_guild(10, 100);
        fixture
            .gateway
            .fail_ban(g.id, user(2), BanFailure::not_found("Unknown User"));

        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let desired: HashSet<UserId> = [user(1), user(2)].into_iter().collect();
        let result = engine(&fixture)
            .reconcile_guild(&g, &desired, ChannelId::new(100))
            .await;

        assert_eq!(result.self_healed, 1);
        let lines = buffer.lines();
        let removal = lines
            .iter()
            .find(|line| line.contains("removing from registry"))
            .unwrap_or_else(|| panic!("no removal line in {lines:?}"));
        assert!(removal.contains("guild_id=10"), "{removal}");
        assert!(removal.contains("user_id=2"), "{removal}");
    }
}
