//! Common fixtures.

use std::sync::Arc;

use banlist_core::{ChannelId, EnforcementContext, Guild, GuildConfig, GuildId, UserId};
use banlist_effects::MemoryRegistryStore;

use crate::gateway::MockGateway;
use crate::pacer::RecordingPacer;

/// Owner recorded for every fixture guild.
pub const FIXTURE_OWNER: u64 = 1;

/// Guild handle `guild-{id}` owned by [`FIXTURE_OWNER`].
pub fn guild(id: u64) -> Guild {
    Guild::new(GuildId::new(id), UserId::new(FIXTURE_OWNER), format!("guild-{id}"))
}

/// Shorthand for a user id.
pub fn user(id: u64) -> UserId {
    UserId::new(id)
}

/// Memory store, mock gateway and recording pacer wired together.
pub struct Fixture {
    /// Registry store
    pub store: Arc<MemoryRegistryStore>,
    /// Platform double
    pub gateway: Arc<MockGateway>,
    /// Delay recorder
    pub pacer: Arc<RecordingPacer>,
}

impl Fixture {
    /// Fixture whose registry holds `flagged`.
    pub fn new(flagged: impl IntoIterator<Item = u64>) -> Self {
        Self {
            store: Arc::new(MemoryRegistryStore::with_flagged(
                flagged.into_iter().map(UserId::new),
            )),
            gateway: Arc::new(MockGateway::new()),
            pacer: Arc::new(RecordingPacer::new(42)),
        }
    }

    /// Effect context over this fixture.
    pub fn context(&self) -> EnforcementContext {
        EnforcementContext::new(self.store.clone(), self.gateway.clone(), self.pacer.clone())
    }

    /// Join `guild_id` and store it as enabled with `channel` configured.
    pub fn enable_guild(&self, guild_id: u64, channel: u64) -> Guild {
        let handle = guild(guild_id);
        self.gateway.add_guild(handle.clone());
        let mut config = GuildConfig::new(handle.id, handle.owner_id);
        config.notification_channel_id = Some(ChannelId::new(channel));
        config.enforcement_enabled = true;
        self.store.insert_guild(config);
        handle
    }
}
