//! MCP tool modules.
//!
//! Tools are grouped by domain: session lifecycle, table files and table
//! registration, graph-wide metadata, predictive queries, and contextual help.

mod context;
pub mod graph;
pub mod model;
mod session;
pub mod table;

#[cfg(test)]
pub use context::HelpCommands;
