//! Contract between the pipeline and the indexing/search engine.
//!
//! The pipeline never touches embeddings or storage directly; it hands the
//! corpus path and filter options to a [`SearchBackend`] and reads ranked
//! passages back.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexOptions {
    pub include_extensions: Vec<String>,
    pub exclude_folders: Vec<String>,
    /// Number of embedding workers.
    pub concurrency: usize,
    /// Texts per embedding call.
    pub embed_batch_size: usize,
}

/// One ranked passage as the engine returns it.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineMatch {
    /// Absolute path of the source file.
    pub file_path: PathBuf,
    pub score: f32,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct EngineSearch {
    /// Descending relevance.
    pub matches: Vec<EngineMatch>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingStats {
    /// Files (re-)embedded in this run.
    pub indexed: usize,
    /// Files left alone because their content did not change.
    pub skipped: usize,
    /// Files dropped from the index because they left the corpus.
    pub removed: usize,
    /// Chunks written in this run.
    pub chunks: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderStats {
    pub files: usize,
    pub chunks: usize,
    /// Unix seconds of the most recent write.
    pub last_indexed: Option<i64>,
    pub embedder: Option<String>,
}

pub trait SearchBackend: Send + Sync {
    /// Index `folder`, re-embedding only content that changed since the last run.
    fn index(&self, folder: &Path, options: &IndexOptions) -> Result<IndexingStats, EngineError>;

    /// Forget everything indexed for `folder`. No-op when nothing is indexed.
    fn clear_folder(&self, folder: &Path) -> Result<(), EngineError>;

    /// At most `top_k` passages from `folder`, best first.
    fn search(&self, folder: &Path, query: &str, top_k: usize) -> Result<EngineSearch, EngineError>;

    fn stats(&self, folder: &Path) -> Result<FolderStats, EngineError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Canned backend for pipeline and boundary tests.

    use std::sync::Mutex;

    use super::*;
    use crate::error::EmbeddingError;

    /// Returns fixed passages, filtered to those sharing a word with the query.
    /// With `fail` set every call reports an embedding failure; with
    /// `ignore_top_k` every matching passage is returned.
    #[derive(Default)]
    pub struct StaticBackend {
        pub passages: Vec<EngineMatch>,
        pub fail: bool,
        pub ignore_top_k: bool,
        pub calls: Mutex<Vec<String>>,
    }

    impl StaticBackend {
        pub fn new(passages: &[(&str, f32, &str)]) -> Self {
            Self {
                passages: passages
                    .iter()
                    .map(|(path, score, content)| EngineMatch {
                        file_path: PathBuf::from(path),
                        score: *score,
                        content: content.to_string(),
                    })
                    .collect(),
                ..Self::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        fn record(&self, call: String) -> Result<(), EngineError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call);
            }
            if self.fail {
                return Err(EngineError::Embedding(EmbeddingError::Request {
                    endpoint: "http://embedder".to_string(),
                    message: "connection refused".to_string(),
                }));
            }
            Ok(())
        }
    }

    impl SearchBackend for StaticBackend {
        fn index(&self, folder: &Path, options: &IndexOptions) -> Result<IndexingStats, EngineError> {
            self.record(format!(
                "index {} [{}] -[{}] c{} b{}",
                folder.display(),
                options.include_extensions.join(","),
                options.exclude_folders.join(","),
                options.concurrency,
                options.embed_batch_size
            ))?;
            Ok(IndexingStats::default())
        }

        fn clear_folder(&self, folder: &Path) -> Result<(), EngineError> {
            self.record(format!("clear {}", folder.display()))
        }

        fn search(&self, folder: &Path, query: &str, top_k: usize) -> Result<EngineSearch, EngineError> {
            self.record(format!("search {} {:?} {}", folder.display(), query, top_k))?;
            let words: Vec<String> = query
                .to_lowercase()
                .split_whitespace()
                .map(String::from)
                .collect();
            let limit = if self.ignore_top_k { usize::MAX } else { top_k };
            let matches = self
                .passages
                .iter()
                .filter(|p| {
                    let lowered = p.content.to_lowercase();
                    words.iter().any(|w| lowered.contains(w.as_str()))
                })
                .take(limit)
                .cloned()
                .collect();
            Ok(EngineSearch {
                matches,
                duration_ms: 3,
            })
        }

        fn stats(&self, _folder: &Path) -> Result<FolderStats, EngineError> {
            Ok(FolderStats {
                files: self.passages.len(),
                chunks: self.passages.len(),
                last_indexed: None,
                embedder: Some("static".to_string()),
            })
        }
    }
}
