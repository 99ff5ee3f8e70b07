//! # ledgersync-api
//!
//! The HTTP/JSON-RPC surface for the ledgersync sync server: the request
//! pipeline (C8), the REST/RPC handlers (C9, C11, C12), the MCP
//! tool-protocol front-end (C10, C13), and the router assembly that wires
//! them together behind one [`state::AppState`].
//!
//! `ledgersync-server` owns the binary entry point, configuration
//! bootstrap, and storage-backend selection; this crate is
//! transport/protocol only and depends on nothing backend-specific beyond
//! the `ledgersync-storage` traits.

pub mod attachments;
pub mod error;
pub mod grpc;
pub mod handlers;
pub mod mcp;
pub mod payload;
pub mod pipeline;
pub mod rate_limit;
pub mod routes;
pub mod session;
pub mod state;
pub mod subject_store;

pub use error::{SyncError, WithCorrelation};
pub use pipeline::{PipelineContext, SyncContext};
pub use routes::build as build_router;
pub use state::AppState;

/// Commonly imported items.
pub mod prelude {
    pub use crate::error::{PreconditionKind, SyncError, WithCorrelation};
    pub use crate::pipeline::{PipelineContext, SyncContext};
    pub use crate::state::AppState;
}
