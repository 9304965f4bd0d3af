use std::path::{Path, PathBuf};

use rfm_core::graph::TableRegistry;
use rfm_core::source::{ArrowTableLoader, TableLoader, discover_table_files};
use rfm_store::{AddTableMetadata, LinkMetadata, TableMetadata};
use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::KumoRfmMcp;
use crate::helpers::{self, ToolFailure, ToolResult};

const DEFAULT_PREVIEW_ROWS: usize = 20;
const MAX_PREVIEW_ROWS: usize = 1000;

/// Parameters for listing table files in a directory.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FindTableFilesParams {
    /// Directory to search.
    pub path: String,
    /// Descend into subdirectories.
    #[serde(default)]
    pub recursive: bool,
}

/// Parameters for previewing a table file.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InspectTableFileParams {
    /// Path to a `.csv` or `.parquet` file.
    pub path: String,
    /// Number of leading rows to return (1 to 1000, default 20).
    pub num_rows: Option<usize>,
}

/// Parameters naming a registered table.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TableNameParams {
    pub name: String,
}

/// Inferred metadata and leading rows of a table file.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TablePreview {
    pub metadata: TableMetadata,
    pub rows: Vec<Value>,
}

/// Result of removing a table.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RemovedTable {
    pub name: String,
    pub removed_links: Vec<LinkMetadata>,
}

#[tool_router(router = tool_router_table, vis = "pub")]
impl KumoRfmMcp {
    #[tool(description = "List .csv and .parquet files in a local directory, sorted by path, with their sizes in bytes.")]
    async fn find_table_files(
        &self,
        Parameters(params): Parameters<FindTableFilesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let result: ToolResult<_> = async {
            let root = PathBuf::from(&params.path);
            let files = tokio::task::spawn_blocking(move || {
                discover_table_files(&root, params.recursive)
            })
            .await?
            .map_err(ToolFailure::domain)?;
            Ok(files)
        }
        .await;
        helpers::respond("Failed to find table files", "Table files listed", result)
    }

    #[tool(description = "Preview a .csv or .parquet file: inferred column types and the first rows as JSON records.")]
    async fn inspect_table_file(
        &self,
        Parameters(params): Parameters<InspectTableFileParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let result: ToolResult<_> = async {
            let num_rows = params.num_rows.unwrap_or(DEFAULT_PREVIEW_ROWS);
            if !(1..=MAX_PREVIEW_ROWS).contains(&num_rows) {
                return Err(ToolFailure::domain(format!(
                    "num_rows must be between 1 and {MAX_PREVIEW_ROWS}, got {num_rows}"
                )));
            }
            let path = params.path;
            tokio::task::spawn_blocking(move || preview_table_file(&path, num_rows)).await?
        }
        .await;
        helpers::respond("Failed to inspect table file", "Table file inspected", result)
    }

    #[tool(description = "Load a .csv or .parquet file and register it as a table. Column types are inferred; primary_key and time_column are optional overrides.")]
    async fn add_table(
        &self,
        Parameters(params): Parameters<AddTableMetadata>,
    ) -> Result<CallToolResult, ErrorData> {
        let result: ToolResult<_> = async {
            let session = self.session().await?;
            let table = tokio::task::spawn_blocking(move || {
                session.blocking_lock().add_table(&params)
            })
            .await??;
            Ok(table)
        }
        .await;
        helpers::respond("Failed to add table", "Table added successfully", result)
    }

    #[tool(description = "Remove a table from the graph. Links touching the table are removed too and reported.")]
    async fn remove_table(
        &self,
        Parameters(params): Parameters<TableNameParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let result: ToolResult<_> = async {
            let session = self.session().await?;
            let removed_links = session.lock().await.remove_table(&params.name)?;
            Ok(RemovedTable {
                name: params.name,
                removed_links,
            })
        }
        .await;
        helpers::respond("Failed to remove table", "Table removed successfully", result)
    }

    #[tool(description = "Link two tables: foreign_key is a column of source_table referencing the primary key of destination_table.")]
    async fn link_tables(
        &self,
        Parameters(link): Parameters<LinkMetadata>,
    ) -> Result<CallToolResult, ErrorData> {
        let result: ToolResult<_> = async {
            let session = self.session().await?;
            session.lock().await.link(&link)?;
            Ok(link)
        }
        .await;
        helpers::respond("Failed to link tables", "Tables linked successfully", result)
    }

    #[tool(description = "Remove an existing link between two tables.")]
    async fn unlink_tables(
        &self,
        Parameters(link): Parameters<LinkMetadata>,
    ) -> Result<CallToolResult, ErrorData> {
        let result: ToolResult<_> = async {
            let session = self.session().await?;
            session.lock().await.unlink(&link)?;
            Ok(link)
        }
        .await;
        helpers::respond("Failed to unlink tables", "Tables unlinked successfully", result)
    }
}

fn preview_table_file(path: &str, num_rows: usize) -> ToolResult<TablePreview> {
    let data = ArrowTableLoader::new()
        .load(path)
        .map_err(ToolFailure::domain)?;
    let rows = data.head_records(num_rows).map_err(ToolFailure::domain)?;
    let name = Path::new(path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(path)
        .to_string();
    let metadata = TableRegistry::from_data(name, path, data)
        .map_err(ToolFailure::domain)?
        .metadata();
    Ok(TablePreview { metadata, rows })
}
