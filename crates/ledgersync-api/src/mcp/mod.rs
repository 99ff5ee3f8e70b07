//! MCP session & tool dispatch (component C10): a secondary JSON-RPC 2.0
//! front-end over HTTP implementing MCP Streamable-HTTP.

mod handlers;
mod registry;
mod session;

pub use handlers::router;
pub use registry::{ToolDescriptor, ToolRegistry};
pub use session::{McpSession, McpSessionStore};

/// Protocol versions this server understands.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26"];

/// All MCP-facing state: the session map and the (read-only-after-startup)
/// tool registry.
pub struct McpState {
    pub sessions: McpSessionStore,
    pub tools: ToolRegistry,
}

impl McpState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: McpSessionStore::new(),
            tools: registry::build_registry(),
        }
    }
}

impl Default for McpState {
    fn default() -> Self {
        Self::new()
    }
}
