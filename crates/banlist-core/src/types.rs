//! Platform identifiers and guild handles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw platform snowflake.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Raw snowflake value.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map(Self)
            }
        }
    };
}

snowflake_id!(
    /// A guild (community/server) on the chat platform.
    GuildId
);
snowflake_id!(
    /// A platform user. Flagged identities in the registry are `UserId`s.
    UserId
);
snowflake_id!(
    /// A text channel used for guild notifications.
    ChannelId
);

/// A live guild handle as resolved through the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    /// Guild identifier
    pub id: GuildId,
    /// Current owner of the guild
    pub owner_id: UserId,
    /// Display name, informational only
    pub name: String,
}

impl Guild {
    /// Create a guild handle.
    pub fn new(id: GuildId, owner_id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            owner_id,
            name: name.into(),
        }
    }
}

/// A guild that is enabled and has a notification channel, i.e. one the
/// fleet scheduler must reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnforcementTarget {
    /// Guild to reconcile
    pub guild_id: GuildId,
    /// Channel receiving notifications for that guild
    pub channel_id: ChannelId,
}
