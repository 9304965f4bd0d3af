use rfm_store::{LinkMetadata, UpdateGraphMetadata};
use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::KumoRfmMcp;
use crate::helpers::{self, ToolResult};

/// Parameters for rendering the graph as a Mermaid diagram.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct MermaidParams {
    /// List every active column instead of only key and time columns.
    #[serde(default)]
    pub show_columns: bool,
}

/// Links added by link inference.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InferredLinks {
    pub inferred_links: Vec<LinkMetadata>,
}

#[tool_router(router = tool_router_graph, vis = "pub")]
impl KumoRfmMcp {
    #[tool(description = "Get the graph metadata: every table with its columns, dtypes, semantic types, primary key and time column, plus all links.")]
    async fn inspect_graph_metadata(&self) -> Result<CallToolResult, ErrorData> {
        let result: ToolResult<_> = async {
            let session = self.session().await?;
            let graph = session.lock().await.graph_metadata();
            Ok(graph)
        }
        .await;
        helpers::respond(
            "Failed to inspect graph metadata",
            "Graph metadata retrieved successfully",
            result,
        )
    }

    #[tool(description = "Apply a batch of graph edits: tables_to_add, tables_to_update (stypes, primary_key, time_column; omitted fields are unchanged, null clears), links_to_remove, links_to_add, tables_to_remove. Items are applied independently; failures are listed in `errors` next to the resulting graph.")]
    async fn update_graph_metadata(
        &self,
        Parameters(request): Parameters<UpdateGraphMetadata>,
    ) -> Result<CallToolResult, ErrorData> {
        let result: ToolResult<_> = async {
            let session = self.session().await?;
            let updated = tokio::task::spawn_blocking(move || {
                session.blocking_lock().update_graph_metadata(&request)
            })
            .await?;
            Ok(updated)
        }
        .await;
        let message = match &result {
            Ok(updated) if !updated.errors.is_empty() => format!(
                "Graph metadata updated with {} error(s)",
                updated.errors.len()
            ),
            _ => "Graph metadata updated successfully".to_string(),
        };
        helpers::respond("Failed to update graph metadata", message, result)
    }

    #[tool(description = "Render the graph as a Mermaid entity-relationship diagram.")]
    async fn get_mermaid(
        &self,
        Parameters(params): Parameters<MermaidParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let result: ToolResult<_> = async {
            let session = self.session().await?;
            let mermaid = session.lock().await.mermaid(params.show_columns);
            Ok(mermaid)
        }
        .await;
        helpers::respond("Failed to render graph", "Mermaid diagram generated", result)
    }

    #[tool(description = "Link every column named like another table's primary key to that table. Only works while the graph has no links.")]
    async fn infer_links(&self) -> Result<CallToolResult, ErrorData> {
        let result: ToolResult<_> = async {
            let session = self.session().await?;
            let inferred_links = session.lock().await.infer_links()?;
            Ok(InferredLinks { inferred_links })
        }
        .await;
        helpers::respond("Failed to infer links", "Link inference completed", result)
    }

    #[tool(description = "Check every graph invariant and report all violations at once.")]
    async fn validate_graph(&self) -> Result<CallToolResult, ErrorData> {
        let result: ToolResult<_> = async {
            let session = self.session().await?;
            session.lock().await.validate()?;
            Ok(())
        }
        .await;
        helpers::respond("Graph is invalid", "Graph is valid", result)
    }

    #[tool(description = "Validate the graph and materialize it into a KumoRFM model. Required before predict, evaluate and validate_query, and again after any graph change.")]
    async fn materialize_graph(&self) -> Result<CallToolResult, ErrorData> {
        let result: ToolResult<_> = async {
            let session = self.session().await?;
            let summary = session.lock().await.materialize().await?;
            Ok(summary)
        }
        .await;
        helpers::respond(
            "Failed to materialize graph",
            "Graph materialized successfully",
            result,
        )
    }
}
