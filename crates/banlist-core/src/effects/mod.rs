//! Effect trait definitions
//!
//! # Effect Classification
//!
//! - **Category**: Infrastructure Effects
//! - **Implementation**: `banlist-effects` (production), `banlist-testkit` (tests)
//! - **Usage**: the reconciliation engine, fleet scheduler and admin commands
//!
//! - `RegistryStore`: flagged identities and per-guild configuration
//! - `GuildGateway`: the chat platform, seen from one bot account
//! - `Pacer`: sleeping and jitter sampling

pub mod gateway;
pub mod pacer;
pub mod store;

pub use gateway::{BanRequest, GuildGateway};
pub use pacer::Pacer;
pub use store::RegistryStore;
