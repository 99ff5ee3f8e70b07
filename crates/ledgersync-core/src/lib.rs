//! Core domain types shared across every ledgersync crate: the entity kind
//! enum, the LWW timestamp type, the pagination cursor codec, and a small
//! error type for the parsing concerns that live at this layer.

pub mod cursor;
pub mod error;
pub mod kind;
pub mod time;

pub use cursor::Cursor;
pub use error::{CoreError, Result};
pub use kind::EntityKind;
pub use time::{SyncTimestamp, now_ms};
