//! # Banlist Sync - Reconciliation and Scheduling
//!
//! Keeps every opted-in guild's ban list a superset of the global registry:
//!
//! - [`ReconciliationEngine`]: one guild, one pass; diff, ban, classify, self-heal
//! - [`FleetScheduler`]: startup, periodic and triggered passes with jitter and
//!   a per-guild lock
//! - [`AdminCommands`]: configuration commands and on-demand syncs
//! - [`BanlistRuntime`]: the context object owning all of the above
//!
//! ## Design Principles
//!
//! - **Never unban**: the gateway has no unban operation
//! - **Sequential fleet passes**: guilds one at a time, bans one at a time
//! - **Local failure**: a failure in one guild never stops another
//! - **Shrink-only registry**: identities leave only on authoritative not-found

#![forbid(unsafe_code)]

pub mod commands;
pub mod config;
pub mod engine;
pub mod runtime;
pub mod scheduler;
pub mod tasks;

pub use commands::{
    sync_complete_message, AdminCommands, EnableOutcome, SetChannelOutcome, SyncTask,
};
pub use config::{EngineConfig, RuntimeConfig, SchedulerConfig};
pub use engine::{ReconciliationEngine, ReconciliationResult};
pub use runtime::BanlistRuntime;
pub use scheduler::{FleetReport, FleetScheduler, SyncTrigger};
pub use tasks::{FirstRun, LoopHandle, TaskRegistry};
