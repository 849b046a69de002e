//! Semantic search over the corpus
//!
//! - `embedding`: embedding backends and their selection
//! - `backend`: the index/search contract the pipeline depends on
//! - `engine` + `vectordb`: the bundled SQLite-backed implementation

pub mod backend;
pub mod embedding;
pub mod engine;
pub mod vectordb;

pub use backend::{EngineMatch, EngineSearch, FolderStats, IndexOptions, IndexingStats, SearchBackend};
pub use embedding::{select_embedder, Embedder, EmbeddingBackend};
pub use engine::CodebaseEngine;
pub use vectordb::VectorDB;
