//! codebase-rag library
//!
//! Retrieval-augmented question answering over a source tree, plus a
//! harness that scores retrieval against a fixed QA set.
//!
//! # Modules
//!
//! - `core`: configuration, corpus walking, chunking, path handling
//! - `search`: embedding backends and the SQLite-backed search engine
//! - `rag`: the pipeline (index, ask, evaluate)
//! - `server`: HTTP API
//! - `mcp`: MCP server exposing the pipeline as tools

pub mod core;
pub mod error;
#[cfg(feature = "mcp")]
pub mod mcp;
pub mod rag;
pub mod search;
pub mod server;

// Re-exports for convenience
pub use crate::core::config::AppConfig;
pub use crate::core::paths::ProjectPaths;
pub use error::{EmbeddingError, EngineError, RagError, Result};
pub use rag::{AnswerResponse, ChunkMatch, EvalReport, EvalResult, IndexStatus, QaCase, RagPipeline, NO_CONTEXT_ANSWER};
pub use search::{CodebaseEngine, Embedder, EmbeddingBackend, SearchBackend};
