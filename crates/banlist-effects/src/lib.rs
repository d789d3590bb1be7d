//! # Banlist Effects - Effect Handlers
//!
//! Concrete implementations of the `banlist-core` effect traits:
//!
//! - [`MemoryRegistryStore`]: process-local store for tests and dry runs
//! - [`PostgresRegistryStore`]: durable store over the `users`/`servers` tables
//! - [`RestGateway`]: the chat platform's REST API over `reqwest`
//! - [`TokioPacer`]: tokio timer sleeps with `rand` jitter

#![forbid(unsafe_code)]

pub mod memory;
pub mod pacer;
pub mod postgres;
pub mod rest;

pub use memory::MemoryRegistryStore;
pub use pacer::TokioPacer;
pub use postgres::PostgresRegistryStore;
pub use rest::{RestGateway, RestGatewayConfig};
