use rmcp::{
    ErrorData,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::KumoRfmMcp;

/// Payload listing every MCP command.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct HelpCommands {
    pub commands: Vec<String>,
}

impl Default for HelpCommands {
    fn default() -> Self {
        let commands = [
            "help - List the MCP commands of this server.",
            "health - Health check, returns 'ok'.",
            "get_session_status - Show authentication, tables, link count and model readiness.",
            "clear_session - Remove all tables, links and the materialized model.",
            "find_table_files - List .csv and .parquet files in a directory.",
            "inspect_table_file - Preview inferred column types and leading rows of a file.",
            "add_table - Load a file and register it as a table.",
            "remove_table - Remove a table and every link touching it.",
            "link_tables - Link a foreign key column to another table's primary key.",
            "unlink_tables - Remove a link.",
            "inspect_graph_metadata - Show all tables, columns and links.",
            "update_graph_metadata - Apply a batch of table, column and link edits.",
            "infer_links - Link columns named like another table's primary key.",
            "get_mermaid - Render the graph as a Mermaid ER diagram.",
            "validate_graph - Report every graph invariant violation.",
            "materialize_graph - Build a KumoRFM model from the graph.",
            "predict - Run a predictive query.",
            "evaluate - Evaluate a predictive query against historical labels.",
            "validate_query - Check a predictive query without running it.",
        ];
        Self {
            commands: commands.iter().map(ToString::to_string).collect(),
        }
    }
}

#[tool_router(router = tool_router_context, vis = "pub")]
impl KumoRfmMcp {
    #[tool(description = "List the MCP commands to get context with how this MCP server works.")]
    async fn help(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::json(HelpCommands::default())?]))
    }
}
