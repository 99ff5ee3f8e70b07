//! In-memory backend for the ledgersync sync server.
//!
//! This crate provides [`MemoryStore`], a `dashmap`-backed implementation of
//! `ledgersync_storage::{SyncStore, OwnerStore}`. It is the reference
//! backend used by the crate's own test suites and by local development;
//! `ledgersync-db-postgres` is the durable counterpart used in production.
//!
//! # Example
//!
//! ```ignore
//! use ledgersync_db_memory::create_memory_backend;
//!
//! let store = create_memory_backend();
//! ```

mod store;

pub use store::MemoryStore;

use std::sync::Arc;

use ledgersync_storage::{OwnerStore, SyncStore};

/// Creates a fresh, empty in-memory backend shared by both storage traits.
#[must_use]
pub fn create_memory_backend() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

/// Type alias for a shareable [`SyncStore`] trait object backed by
/// [`MemoryStore`].
pub type DynMemorySyncStore = Arc<dyn SyncStore>;

/// Type alias for a shareable [`OwnerStore`] trait object backed by
/// [`MemoryStore`].
pub type DynMemoryOwnerStore = Arc<dyn OwnerStore>;
