//! Retrieval-augmented answering and its evaluation harness.
//!
//! [`RagPipeline`] is built once at startup and shared by reference with
//! every entry point (CLI commands, HTTP handlers, MCP tools).

pub mod eval;
pub mod synthesize;

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

pub use eval::{EvalReport, EvalResult, QaCase};
pub use synthesize::{synthesize, NO_CONTEXT_ANSWER};

use crate::core::chunker::Chunker;
use crate::core::config::AppConfig;
use crate::error::{RagError, Result};
use crate::search::backend::{FolderStats, IndexOptions, IndexingStats, SearchBackend};
use crate::search::engine::CodebaseEngine;

pub const QUESTION_REQUIRED: &str = "question is required";

/// A retrieved passage as presented to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMatch {
    /// Relative to the project root.
    pub file_path: String,
    /// Rounded to 4 decimals.
    pub score: f64,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub question: String,
    pub answer: String,
    pub matches: Vec<ChunkMatch>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub corpus_path: String,
    #[serde(flatten)]
    pub stats: FolderStats,
}

pub struct RagPipeline {
    config: AppConfig,
    engine: Arc<dyn SearchBackend>,
}

impl RagPipeline {
    pub fn new(config: AppConfig, engine: Arc<dyn SearchBackend>) -> Self {
        Self { config, engine }
    }

    /// Wire the bundled engine with the configured embedding backend.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        info!(embedder = %config.embedding, corpus = %config.corpus.path.display(), "starting pipeline");
        let embedder = config.embedding.build(config.http_timeout)?;
        let engine = CodebaseEngine::new(config.paths.db.clone(), embedder)
            .with_chunker(Chunker::new(config.indexing.max_chunk_chars));
        Ok(Self::new(config, Arc::new(engine)))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Corpus path as shown in reports.
    pub fn corpus_display(&self) -> String {
        self.config.paths.relative_to_root(&self.config.corpus.path)
    }

    fn index_options(&self) -> IndexOptions {
        IndexOptions {
            include_extensions: self.config.corpus.include_extensions.clone(),
            exclude_folders: self.config.corpus.exclude_folders.clone(),
            concurrency: self.config.indexing.concurrency,
            embed_batch_size: self.config.indexing.embed_batch_size,
        }
    }

    fn resolve_top_k(&self, top_k: Option<usize>) -> Result<usize> {
        match top_k {
            Some(0) => Err(RagError::Validation("topK must be a positive integer".to_string())),
            Some(k) => Ok(k),
            None => Ok(self.config.default_top_k),
        }
    }

    /// (Re)build the index. With `force`, everything indexed for the corpus
    /// is dropped first; otherwise only changed files are re-embedded.
    pub fn build_index(&self, force: bool) -> Result<IndexingStats> {
        let corpus = &self.config.corpus.path;
        if force {
            self.engine.clear_folder(corpus)?;
        }
        let stats = self.engine.index(corpus, &self.index_options())?;
        info!(force, indexed = stats.indexed, skipped = stats.skipped, "index built");
        Ok(stats)
    }

    /// Retrieve up to `top_k` passages for `question` and synthesize an answer.
    pub fn ask(&self, question: &str, top_k: Option<usize>) -> Result<AnswerResponse> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::Validation(QUESTION_REQUIRED.to_string()));
        }
        let top_k = self.resolve_top_k(top_k)?;

        let start = Instant::now();
        let result = self.engine.search(&self.config.corpus.path, question, top_k)?;
        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(top_k, engine_ms = result.duration_ms, duration_ms, "search finished");

        let mut retrieved = result.matches;
        retrieved.truncate(top_k);
        let answer = synthesize(
            question,
            &retrieved.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
        );

        let matches = retrieved
            .into_iter()
            .map(|m| ChunkMatch {
                file_path: self.config.paths.relative_to_root(&m.file_path),
                score: eval::round_to(f64::from(m.score), 4),
                content: m.content,
            })
            .collect();

        Ok(AnswerResponse {
            question: question.to_string(),
            answer,
            matches,
            duration_ms,
        })
    }

    pub fn run_evaluation(&self, top_k: Option<usize>) -> Result<EvalReport> {
        let top_k = self.resolve_top_k(top_k)?;
        eval::run_evaluation(self, top_k)
    }

    pub fn status(&self) -> Result<IndexStatus> {
        Ok(IndexStatus {
            corpus_path: self.corpus_display(),
            stats: self.engine.stats(&self.config.corpus.path)?,
        })
    }
}
