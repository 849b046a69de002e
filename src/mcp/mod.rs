//! MCP Server for the codebase RAG pipeline
//!
//! Exposes ask, index and eval as tools over stdio.

mod server;

pub use server::{run_mcp_server, RagService};
