//! # ledgersync-storage
//!
//! Storage abstraction layer for the ledgersync sync backend.
//!
//! This crate defines the traits and types that every storage backend must
//! implement. It does not contain any implementations — those live in
//! `ledgersync-db-memory` and `ledgersync-db-postgres`.
//!
//! ## Overview
//!
//! - [`SyncStore`] — the LWW store (component C3): transactional push,
//!   tombstone-aware pull, and optimistic-concurrency single-item writes.
//! - [`OwnerStore`] — the epoch & wipe coordinator (component C4): owner
//!   state lifecycle and the destructive `wipe` operation.
//!
//! ## Example
//!
//! ```ignore
//! use ledgersync_storage::{SyncStore, PushItem};
//! use ledgersync_core::EntityKind;
//!
//! async fn push_one(store: &dyn SyncStore, owner: &str, item: PushItem) {
//!     let acks = store.push(owner, EntityKind::Note, vec![item]).await.expect("commit");
//!     assert!(acks[0].is_ok());
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::{OwnerStore, SyncStore};
pub use types::{
    DeleteMarker, ListDeletionOutcome, OwnerState, ParentRef, PullPage, PushAck, PushItem,
    SyncRow, WipeOutcome,
};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a boxed sync store trait object.
pub type DynSyncStore = std::sync::Arc<dyn SyncStore>;

/// Type alias for a boxed owner store trait object.
pub type DynOwnerStore = std::sync::Arc<dyn OwnerStore>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use ledgersync_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::traits::{OwnerStore, SyncStore};
    pub use crate::types::{
        DeleteMarker, ListDeletionOutcome, OwnerState, ParentRef, PullPage, PushAck, PushItem,
        SyncRow, WipeOutcome,
    };
    pub use crate::{DynOwnerStore, DynSyncStore, StorageResult};
}
