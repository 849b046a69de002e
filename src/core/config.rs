//! Process configuration, read once at startup from the environment.
//!
//! Every value goes through an injectable lookup so tests can build a config
//! from a map instead of mutating the process environment.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::chunker::DEFAULT_MAX_CHUNK_CHARS;
use super::corpus::Corpus;
use super::paths::ProjectPaths;
use crate::error::{RagError, Result};
use crate::search::embedding::EmbeddingBackend;

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_INCLUDE_EXTENSIONS: &[&str] = &[".ts", ".md"];
pub const DEFAULT_EXCLUDE_FOLDERS: &[&str] = &["node_modules", "dist", ".git", ".rag"];

/// Environment lookup; returns `None` for unset variables.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Knobs handed to the indexing engine.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexTuning {
    pub concurrency: usize,
    pub embed_batch_size: usize,
    pub max_chunk_chars: usize,
}

impl Default for IndexTuning {
    fn default() -> Self {
        Self {
            concurrency: 2,
            embed_batch_size: 16,
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub paths: ProjectPaths,
    pub corpus: Corpus,
    pub default_top_k: usize,
    pub port: u16,
    pub indexing: IndexTuning,
    pub embedding: EmbeddingBackend,
    /// Per-request timeout for embedding HTTP calls.
    pub http_timeout: Duration,
    /// Upper bound on a whole index/ask/eval call at the service boundary.
    pub request_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: EnvLookup) -> Result<Self> {
        let root = match env_var(lookup, "RAG_PROJECT_ROOT") {
            Some(root) => PathBuf::from(root),
            None => std::env::current_dir()
                .map_err(|e| RagError::Config(format!("cannot read current directory: {}", e)))?,
        };
        let mut paths = ProjectPaths::from_root(root);
        if let Some(qa) = env_var(lookup, "RAG_QA_SET") {
            paths.qa_set = paths.resolve(qa);
        }
        if let Some(db) = env_var(lookup, "RAG_DB_PATH") {
            paths.db = paths.resolve(db);
        }

        let corpus_path = env_var(lookup, "RAG_CORPUS_PATH")
            .map(|p| paths.resolve(p))
            .unwrap_or_else(|| paths.root.join("sample-codebase"));
        let corpus = Corpus::new(
            corpus_path,
            list_var(lookup, "RAG_INCLUDE_EXTENSIONS", DEFAULT_INCLUDE_EXTENSIONS),
            list_var(lookup, "RAG_EXCLUDE_FOLDERS", DEFAULT_EXCLUDE_FOLDERS),
        );
        if corpus.include_extensions.is_empty() {
            return Err(RagError::Config(
                "RAG_INCLUDE_EXTENSIONS must name at least one extension".to_string(),
            ));
        }

        let defaults = IndexTuning::default();
        let indexing = IndexTuning {
            concurrency: positive_var(lookup, "RAG_INDEX_CONCURRENCY", defaults.concurrency)?,
            embed_batch_size: positive_var(lookup, "RAG_EMBED_BATCH_SIZE", defaults.embed_batch_size)?,
            max_chunk_chars: positive_var(lookup, "RAG_MAX_CHUNK_CHARS", defaults.max_chunk_chars)?,
        };

        Ok(Self {
            paths,
            corpus,
            default_top_k: positive_var(lookup, "RAG_TOP_K", DEFAULT_TOP_K)?,
            port: parse_var(lookup, "PORT", DEFAULT_PORT)?,
            indexing,
            embedding: EmbeddingBackend::resolve(lookup),
            http_timeout: Duration::from_secs(positive_var(lookup, "RAG_HTTP_TIMEOUT_SECS", 30u64)?),
            request_timeout: Duration::from_secs(positive_var(lookup, "RAG_REQUEST_TIMEOUT_SECS", 300u64)?),
        })
    }
}

/// Read a variable, treating empty or whitespace-only values as unset.
pub fn env_var(lookup: EnvLookup, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(lookup: EnvLookup, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env_var(lookup, key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| RagError::Config(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}

fn positive_var<T>(lookup: EnvLookup, key: &str, default: T) -> Result<T>
where
    T: FromStr + PartialOrd + Default + Copy,
    T::Err: Display,
{
    let value = parse_var(lookup, key, default)?;
    if value <= T::default() {
        return Err(RagError::Config(format!("{} must be greater than zero", key)));
    }
    Ok(value)
}

fn list_var(lookup: EnvLookup, key: &str, default: &[&str]) -> Vec<String> {
    match env_var(lookup, key) {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        None => default.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(&|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("RAG_PROJECT_ROOT", "/srv/rag")]).unwrap();
        assert_eq!(config.corpus.path, PathBuf::from("/srv/rag/sample-codebase"));
        assert_eq!(config.corpus.include_extensions, vec![".ts", ".md"]);
        assert_eq!(
            config.corpus.exclude_folders,
            vec!["node_modules", "dist", ".git", ".rag"]
        );
        assert_eq!(config.default_top_k, 5);
        assert_eq!(config.port, 3000);
        assert_eq!(config.indexing, IndexTuning::default());
        assert_eq!(config.paths.qa_set, PathBuf::from("/srv/rag/data/qa-set.json"));
        assert_eq!(config.paths.db, PathBuf::from("/srv/rag/.rag/index.db"));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("RAG_PROJECT_ROOT", "/srv/rag"),
            ("RAG_CORPUS_PATH", "docs"),
            ("RAG_INCLUDE_EXTENSIONS", "rs, md"),
            ("RAG_EXCLUDE_FOLDERS", "target"),
            ("RAG_TOP_K", "8"),
            ("PORT", "8080"),
            ("RAG_INDEX_CONCURRENCY", "4"),
        ])
        .unwrap();
        assert_eq!(config.corpus.path, PathBuf::from("/srv/rag/docs"));
        assert_eq!(config.corpus.include_extensions, vec![".rs", ".md"]);
        assert_eq!(config.corpus.exclude_folders, vec!["target"]);
        assert_eq!(config.default_top_k, 8);
        assert_eq!(config.port, 8080);
        assert_eq!(config.indexing.concurrency, 4);
    }

    #[test]
    fn test_rejects_bad_numbers() {
        let err = config_from(&[("RAG_PROJECT_ROOT", "/srv"), ("RAG_TOP_K", "many")]).unwrap_err();
        assert!(matches!(err, RagError::Config(_)));

        let err = config_from(&[("RAG_PROJECT_ROOT", "/srv"), ("RAG_TOP_K", "0")]).unwrap_err();
        assert!(err.to_string().contains("RAG_TOP_K"));
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = config_from(&[("RAG_PROJECT_ROOT", "/srv"), ("RAG_TOP_K", "  ")]).unwrap();
        assert_eq!(config.default_top_k, DEFAULT_TOP_K);
    }
}
