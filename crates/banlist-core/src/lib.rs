//! # Banlist Core
//!
//! Foundation types shared by every banlist crate:
//! - Platform identifiers (`GuildId`, `UserId`, `ChannelId`)
//! - Typed guild configuration with merge-on-update semantics and its
//!   lifecycle state machine
//! - The unified error type and the ban failure taxonomy
//! - Effect traits for the registry store, the guild gateway and pacing
//!
//! Nothing in this crate performs I/O. Concrete handlers live in
//! `banlist-effects`; the reconciliation engine and scheduler live in
//! `banlist-sync`.

#![forbid(unsafe_code)]

pub mod config;
pub mod context;
pub mod effects;
pub mod errors;
pub mod pacing;
pub mod types;

pub use config::{GuildConfig, GuildConfigUpdate, GuildState};
pub use context::EnforcementContext;
pub use effects::{BanRequest, GuildGateway, Pacer, RegistryStore};
pub use errors::{BanFailure, BanFailureKind, BanlistError, BanlistResult};
pub use pacing::sample_jitter;
pub use types::{ChannelId, EnforcementTarget, Guild, GuildId, UserId};
