//! Embedding backends.
//!
//! The rest of the pipeline only sees [`Embedder`]. Which implementation sits
//! behind it is decided once at startup by [`EmbeddingBackend::resolve`]:
//!
//! 1. `RAG_EMBEDDER` names a backend explicitly (`openai`, `ollama`, `harmonic`)
//! 2. `OPENAI_COMPATIBLE_BASE_URL` is set → OpenAI-compatible endpoint
//! 3. otherwise → local Ollama

pub mod harmonic;
pub mod remote;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

pub use harmonic::HarmonicEmbedder;
pub use remote::{OllamaEmbedder, OpenAiCompatibleEmbedder};

use crate::core::config::{env_var, EnvLookup};
use crate::error::EmbeddingError;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";

/// Maps text to vectors. Shared by indexing and search.
pub trait Embedder: Send + Sync {
    /// Stable identifier of provider and model, e.g. `ollama:nomic-embed-text`.
    fn id(&self) -> &str;

    /// Embed many texts; the output has one vector per input, in order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| EmbeddingError::Malformed("empty embedding batch".to_string()))
    }
}

/// API key that never shows up in logs.
#[derive(Clone, PartialEq)]
pub struct ApiKey(pub String);

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingBackend {
    OpenAiCompatible {
        base_url: String,
        model: String,
        api_key: Option<ApiKey>,
    },
    LocalOllama {
        base_url: String,
        model: String,
    },
    /// Offline deterministic embeddings; no network involved.
    Harmonic,
}

impl EmbeddingBackend {
    /// Apply the selection rule. Never fails: unknown explicit kinds are
    /// logged and ignored.
    pub fn resolve(lookup: EnvLookup) -> Self {
        let openai = |base_url: String| Self::OpenAiCompatible {
            base_url,
            model: env_var(lookup, "OPENAI_COMPATIBLE_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            api_key: env_var(lookup, "OPENAI_API_KEY").map(ApiKey),
        };
        let ollama = || Self::LocalOllama {
            base_url: env_var(lookup, "OLLAMA_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            model: env_var(lookup, "OLLAMA_MODEL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
        };

        if let Some(kind) = env_var(lookup, "RAG_EMBEDDER") {
            match kind.to_ascii_lowercase().as_str() {
                "harmonic" => return Self::Harmonic,
                "ollama" => return ollama(),
                "openai" | "openai-compatible" => {
                    return openai(
                        env_var(lookup, "OPENAI_COMPATIBLE_BASE_URL")
                            .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
                    )
                }
                other => warn!(kind = other, "unknown RAG_EMBEDDER, falling back to defaults"),
            }
        }

        match env_var(lookup, "OPENAI_COMPATIBLE_BASE_URL") {
            Some(base_url) => openai(base_url),
            None => ollama(),
        }
    }

    /// Build the embedder. `timeout` bounds each HTTP attempt; an HTTP
    /// client that cannot be built with it is an error.
    pub fn build(&self, timeout: Duration) -> Result<Arc<dyn Embedder>, EmbeddingError> {
        Ok(match self {
            Self::OpenAiCompatible {
                base_url,
                model,
                api_key,
            } => Arc::new(OpenAiCompatibleEmbedder::new(
                base_url,
                model,
                api_key.as_ref().map(|k| k.0.clone()),
                timeout,
            )?),
            Self::LocalOllama { base_url, model } => {
                Arc::new(OllamaEmbedder::new(base_url, model, timeout)?)
            }
            Self::Harmonic => Arc::new(HarmonicEmbedder::new()),
        })
    }
}

impl fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAiCompatible { base_url, model, .. } => {
                write!(f, "openai-compatible {} @ {}", model, base_url)
            }
            Self::LocalOllama { base_url, model } => write!(f, "ollama {} @ {}", model, base_url),
            Self::Harmonic => f.write_str("harmonic (offline)"),
        }
    }
}

/// Resolve and build in one step.
pub fn select_embedder(lookup: EnvLookup, timeout: Duration) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    EmbeddingBackend::resolve(lookup).build(timeout)
}

/// Cosine similarity; 0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}
