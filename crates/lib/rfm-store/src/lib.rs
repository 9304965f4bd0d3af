//! Graph metadata models and schema helpers for kumo-rfm-mcp.
//!
//! This crate defines the canonical data model shared by the table loaders,
//! the session state machine, and the MCP tool layer.

pub mod models;
pub mod schema;
pub mod update;

pub use models::*;
pub use update::*;
