use rmcp::{ErrorData, model::CallToolResult, tool, tool_router};

use crate::KumoRfmMcp;
use crate::helpers::{self, ToolResult};

#[tool_router(router = tool_router_session, vis = "pub")]
impl KumoRfmMcp {
    #[tool(
        description = "Get the session status: initialization, masked credential, table names, link count, and whether a materialized model is ready."
    )]
    async fn get_session_status(&self) -> Result<CallToolResult, ErrorData> {
        let result: ToolResult<_> = async {
            let session = self.sessions.peek_default_session().await;
            let status = session.lock().await.status();
            Ok(status)
        }
        .await;
        helpers::respond(
            "Failed to get session status",
            "Session status retrieved successfully",
            result,
        )
    }

    #[tool(
        description = "Clear the session: remove all tables, links, and the materialized model. Authentication is kept."
    )]
    async fn clear_session(&self) -> Result<CallToolResult, ErrorData> {
        let result: ToolResult<_> = async {
            let session = self.session().await?;
            let mut guard = session.lock().await;
            guard.clear();
            Ok(guard.status())
        }
        .await;
        helpers::respond("Failed to clear session", "Session cleared successfully", result)
    }
}
