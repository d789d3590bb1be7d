//! Banlist Testing Infrastructure
//!
//! Scripted effect handlers and fixtures shared by the integration tests of
//! the sync and cli crates.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! ```rust,no_run
//! use banlist_testkit::*;
//!
//! let fixture = Fixture::new([1, 2, 3]);
//! fixture.gateway.add_guild(guild(10));
//! fixture.enable_guild(10, 100);
//! ```

pub mod fixtures;
pub mod gateway;
pub mod pacer;

pub use fixtures::*;
pub use gateway::{GatewayCall, MockGateway};
pub use pacer::{PacerCall, RecordingPacer};
