//! # ledgersync-server
//!
//! The binary crate: reads [`ledgersync_config::Config`] from the
//! environment, selects a storage backend, builds the auth gate, and runs
//! the [`ledgersync_api`] router. `ledgersync-server` owns process
//! bootstrap only — transport and protocol logic live in `ledgersync-api`.

pub mod observability;
pub mod server;

pub use observability::{init_tracing, shutdown_tracing};
pub use server::{LedgersyncServer, ServerBuilder, build_app};
