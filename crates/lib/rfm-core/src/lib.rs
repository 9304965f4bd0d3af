//! Core types and services for kumo-rfm-mcp.
//!
//! This crate owns the table loaders and schema inference, the graph metadata
//! store, the per-session state machine (including the batch metadata update
//! engine), the session manager, and the interfaces to the external inference
//! service.

pub mod control;
pub mod graph;
pub mod inference;
pub mod services;
pub mod source;
