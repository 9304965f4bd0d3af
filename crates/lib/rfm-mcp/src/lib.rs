//! MCP server implementation for kumo-rfm-mcp.
//!
//! This crate wires the session manager into rmcp tool handlers and exposes
//! the MCP-facing API surface for building graphs and running predictive
//! queries against them.

mod helpers;
mod tools;
pub mod server;

use rfm_core::services::{SessionManager, SharedSession};
use rmcp::{
    ErrorData,
    ServerHandler,
    handler::server::tool::ToolRouter,
    tool,
    tool_handler,
    tool_router,
};
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};

pub use helpers::ToolResponse;

const SERVER_INSTRUCTIONS: &str = r"kumo-rfm-mcp builds a relational graph from local table files and runs KumoRFM predictive queries against it.

Workflow:
1. Locate data with `find_table_files` and preview files with `inspect_table_file`.
2. Register tables with `add_table` (or batch edits with `update_graph_metadata`), choosing a
   primary key and an optional time column per table.
3. Connect tables with `link_tables` (foreign key -> primary key) or `infer_links`.
4. Check the result with `inspect_graph_metadata` or `get_mermaid`, then call `materialize_graph`.
5. Run `predict`, `evaluate` or `validate_query` with a predictive query such as
   `PREDICT COUNT(orders.*, 0, 30, days)>0 FOR users.user_id=1`.

Notes:
- Any change to tables or links drops the materialized model; materialize again before querying.
- Every tool replies with `{ success, message, data? }`.
- `KUMO_API_KEY` must be set in the server environment.
- Use `help` for the tool list. `health` returns `ok`.";

/// MCP server wrapper around the session manager and tool routers.
#[derive(Clone)]
pub struct KumoRfmMcp {
    tool_router: ToolRouter<Self>,
    sessions: SessionManager,
}

impl KumoRfmMcp {
    #[must_use]
    pub fn new(sessions: SessionManager) -> Self {
        let tool_router = Self::tool_router_core()
            + Self::tool_router_session()
            + Self::tool_router_table()
            + Self::tool_router_graph()
            + Self::tool_router_model()
            + Self::tool_router_context();
        Self {
            tool_router,
            sessions,
        }
    }

    /// Retrieves the default session, initializing it if needed.
    pub(crate) async fn session(&self) -> helpers::ToolResult<SharedSession> {
        Ok(self.sessions.get_default_session().await?)
    }
}

#[tool_router(router = tool_router_core, vis = "pub")]
impl KumoRfmMcp {
    #[tool(description = "Health check. Returns 'ok'.")]
    async fn health(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text("ok")]))
    }
}

#[tool_handler]
impl ServerHandler for KumoRfmMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
