//! Error kinds surfaced by the pipeline.
//!
//! Each layer has its own enum: embedding calls fail with [`EmbeddingError`],
//! the bundled index/search engine with [`EngineError`], and every public
//! pipeline operation with [`RagError`], whose variant decides the status the
//! service boundary answers with.

use std::path::PathBuf;

use thiserror::Error;

/// Failure inside an embedding call (network, HTTP status, bad payload).
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },

    #[error("embedding request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("embedding endpoint {endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("malformed embedding response: {0}")]
    Malformed(String),

    #[error("cannot build HTTP client for {endpoint}: {message}")]
    Client { endpoint: String, message: String },
}

impl EmbeddingError {
    /// Whether a second attempt has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Malformed(_) | Self::Client { .. } => false,
        }
    }
}

/// Failure inside the indexing/search engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("index store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("indexing worker pool: {0}")]
    Pool(String),
}

/// Discriminated failure of a pipeline operation.
#[derive(Debug, Error)]
pub enum RagError {
    /// Malformed or missing request input.
    #[error("{0}")]
    Validation(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Embedding(EmbeddingError),

    #[error("search engine error: {0}")]
    Search(EngineError),

    /// The QA set could not be read or parsed; aborts the whole run.
    #[error("evaluation data error: {0}")]
    EvaluationData(String),

    #[error("operation timed out after {0}s")]
    Timeout(u64),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<EngineError> for RagError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Embedding(inner) => Self::Embedding(inner),
            other => Self::Search(other),
        }
    }
}

impl From<EmbeddingError> for RagError {
    fn from(err: EmbeddingError) -> Self {
        Self::Embedding(err)
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
