//! Unified error system for banlist operations
//!
//! `BanlistError` covers everything that can fail outside of a single ban
//! attempt. Ban attempts report a `BanFailure`, whose kind decides what the
//! reconciliation engine does next.

use serde::{Deserialize, Serialize};

use crate::types::GuildId;

/// Unified error type for banlist operations
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum BanlistError {
    /// Registry store failure
    #[error("Store error: {message}")]
    Store {
        /// Error message describing the storage failure
        message: String,
    },

    /// Guild gateway failure outside of a ban attempt
    #[error("Gateway error: {message}")]
    Gateway {
        /// Error message describing the gateway failure
        message: String,
    },

    /// Invalid or missing process configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Guild has no notification channel configured
    #[error("Guild {guild_id} has no info channel configured")]
    NotConfigured {
        /// Guild missing a channel
        guild_id: GuildId,
    },

    /// Guild handle could not be resolved (bot no longer present)
    #[error("Guild {guild_id} is not available")]
    GuildUnavailable {
        /// Unresolvable guild
        guild_id: GuildId,
    },

    /// A background reconciliation ended without reporting a result
    #[error("Reconciliation task for guild {guild_id} ended without a result")]
    TaskDropped {
        /// Guild the task was reconciling
        guild_id: GuildId,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl BanlistError {
    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a gateway error
    pub fn gateway(message: impl Into<String>) -> Self {
        Self::Gateway {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Standard Result type for banlist operations
pub type BanlistResult<T> = std::result::Result<T, BanlistError>;

/// Classification of a failed ban attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BanFailureKind {
    /// The bot lacks the ban capability in this guild
    Permission,
    /// The platform reports the identity as already banned
    Conflict,
    /// The identity no longer exists on the platform
    NotFound,
    /// Anything else; retried on the next pass only
    Transient,
}

/// A failed ban attempt as surfaced by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct BanFailure {
    /// How the engine must react
    pub kind: BanFailureKind,
    /// Platform-provided detail, for logs
    pub message: String,
}

impl BanFailure {
    /// Missing ban permission
    pub fn permission(message: impl Into<String>) -> Self {
        Self::of(BanFailureKind::Permission, message)
    }

    /// Duplicate ban
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::of(BanFailureKind::Conflict, message)
    }

    /// Unknown identity
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::of(BanFailureKind::NotFound, message)
    }

    /// Any other failure
    pub fn transient(message: impl Into<String>) -> Self {
        Self::of(BanFailureKind::Transient, message)
    }

    fn of(kind: BanFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BanlistError::NotConfigured {
            guild_id: GuildId::new(7),
        };
        assert_eq!(err.to_string(), "Guild 7 has no info channel configured");
        assert_eq!(BanlistError::store("down").to_string(), "Store error: down");
    }

    #[test]
    fn test_ban_failure_kinds() {
        assert_eq!(BanFailure::permission("x").kind, BanFailureKind::Permission);
        assert_eq!(BanFailure::conflict("x").kind, BanFailureKind::Conflict);
        assert_eq!(BanFailure::not_found("x").kind, BanFailureKind::NotFound);
        assert_eq!(BanFailure::transient("x").kind, BanFailureKind::Transient);
    }
}
