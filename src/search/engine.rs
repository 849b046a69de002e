//! Search Engine - combines an embedder and the chunk store
//!
//! This is the bundled [`SearchBackend`]: it walks the corpus, chunks and
//! embeds changed files, and answers queries by cosine similarity over the
//! stored chunks.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::backend::{EngineMatch, EngineSearch, FolderStats, IndexOptions, IndexingStats, SearchBackend};
use super::embedding::{cosine_similarity, Embedder};
use super::vectordb::{FileRecord, VectorDB};
use crate::core::chunker::{ChunkDraft, Chunker};
use crate::core::corpus::{collect_source_files, SourceFile};
use crate::error::EngineError;

/// A changed file, chunked and waiting for embeddings.
struct PendingFile {
    path: String,
    content_hash: String,
    mtime: i64,
    chunks: Vec<ChunkDraft>,
}

pub struct CodebaseEngine {
    embedder: Arc<dyn Embedder>,
    db_path: PathBuf,
    chunker: Chunker,
}

impl CodebaseEngine {
    pub fn new(db_path: PathBuf, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            db_path,
            chunker: Chunker::default(),
        }
    }

    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    /// Each call opens its own connection, so the engine itself holds no
    /// mutable state and can be shared across request handlers.
    fn open_db(&self) -> Result<VectorDB, EngineError> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| EngineError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        Ok(VectorDB::open(&self.db_path)?)
    }

    /// Embed every pending chunk in batches of `batch_size` using a pool of
    /// `concurrency` workers. Output order follows input order.
    fn embed_pending(
        &self,
        pending: &[PendingFile],
        concurrency: usize,
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>, EngineError> {
        let texts: Vec<String> = pending
            .iter()
            .flat_map(|file| file.chunks.iter().map(|c| c.content.clone()))
            .collect();
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency.max(1))
            .build()
            .map_err(|e| EngineError::Pool(e.to_string()))?;

        let batches: Vec<Vec<Vec<f32>>> = pool.install(|| {
            texts
                .par_chunks(batch_size.max(1))
                .map(|batch| self.embedder.embed_batch(batch))
                .collect::<Result<Vec<_>, _>>()
        })?;

        Ok(batches.into_iter().flatten().collect())
    }
}

fn folder_key(folder: &Path) -> String {
    folder.to_string_lossy().to_string()
}

impl SearchBackend for CodebaseEngine {
    fn index(&self, folder: &Path, options: &IndexOptions) -> Result<IndexingStats, EngineError> {
        let start = Instant::now();
        let key = folder_key(folder);
        let mut db = self.open_db()?;

        if !folder.exists() {
            warn!(folder = %folder.display(), "corpus folder does not exist; index will be empty");
        }

        // A different embedder makes every stored vector incomparable.
        let previous_embedder = db.embedder_for(&key)?;
        if previous_embedder.as_deref().is_some_and(|id| id != self.embedder.id()) {
            info!(
                previous = previous_embedder.as_deref().unwrap_or_default(),
                current = self.embedder.id(),
                "embedder changed, re-indexing everything"
            );
            db.clear_folder(&key)?;
        }

        let known = db.file_hashes(&key)?;
        let files = collect_source_files(folder, &options.include_extensions, &options.exclude_folders);

        let mut stats = IndexingStats::default();
        let mut pending = Vec::new();
        let mut seen = HashSet::with_capacity(files.len());

        for path in &files {
            let source = match SourceFile::load(path) {
                Ok(source) => source,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };
            let path_key = path.to_string_lossy().to_string();
            seen.insert(path_key.clone());

            if known.get(&path_key) == Some(&source.content_hash) {
                stats.skipped += 1;
                continue;
            }

            pending.push(PendingFile {
                path: path_key,
                content_hash: source.content_hash,
                mtime: source.modified.timestamp(),
                chunks: self.chunker.chunk(&source.content),
            });
        }

        let embeddings = self.embed_pending(&pending, options.concurrency, options.embed_batch_size)?;
        let mut vectors = embeddings.into_iter();

        for file in &pending {
            let chunks: Vec<(ChunkDraft, Vec<f32>)> = file
                .chunks
                .iter()
                .cloned()
                .zip(vectors.by_ref())
                .collect();
            db.replace_file(
                &key,
                &FileRecord {
                    path: &file.path,
                    content_hash: &file.content_hash,
                    mtime: file.mtime,
                },
                &chunks,
            )?;
            stats.indexed += 1;
            stats.chunks += chunks.len();
            debug!(path = %file.path, chunks = chunks.len(), "indexed file");
        }

        for stale in known.keys().filter(|path| !seen.contains(path.as_str())) {
            db.remove_file(&key, stale)?;
            stats.removed += 1;
        }

        db.set_embedder_for(&key, self.embedder.id())?;
        stats.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            folder = %folder.display(),
            indexed = stats.indexed,
            skipped = stats.skipped,
            removed = stats.removed,
            chunks = stats.chunks,
            duration_ms = stats.duration_ms,
            "index complete"
        );
        Ok(stats)
    }

    fn clear_folder(&self, folder: &Path) -> Result<(), EngineError> {
        let mut db = self.open_db()?;
        let removed = db.clear_folder(&folder_key(folder))?;
        info!(folder = %folder.display(), files = removed, "cleared index");
        Ok(())
    }

    fn search(&self, folder: &Path, query: &str, top_k: usize) -> Result<EngineSearch, EngineError> {
        let start = Instant::now();
        let db = self.open_db()?;
        let stored = db.load_chunks(&folder_key(folder))?;
        if stored.is_empty() || top_k == 0 {
            return Ok(EngineSearch {
                matches: Vec::new(),
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        let query_embedding = self.embedder.embed(query)?;

        let mut scored: Vec<EngineMatch> = stored
            .into_iter()
            .map(|(record, embedding)| EngineMatch {
                file_path: PathBuf::from(record.path),
                score: cosine_similarity(&query_embedding, &embedding),
                content: record.content,
            })
            .collect();

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);

        Ok(EngineSearch {
            matches: scored,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn stats(&self, folder: &Path) -> Result<FolderStats, EngineError> {
        Ok(self.open_db()?.get_stats(&folder_key(folder))?)
    }
}
