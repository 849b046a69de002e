//! Chunk store using SQLite
//!
//! Stores chunk embeddings as BLOBs and computes similarity in Rust.
//! Rows are partitioned by the indexed folder so several corpora can share
//! one database file.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use super::backend::FolderStats;
use crate::core::chunker::ChunkDraft;

pub struct VectorDB {
    conn: Connection,
}

/// A stored chunk, without its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub path: String,
    pub chunk_index: usize,
    pub start_line: usize,
    pub content: String,
}

/// Bookkeeping for one indexed file.
#[derive(Debug, Clone)]
pub struct FileRecord<'a> {
    pub path: &'a str,
    pub content_hash: &'a str,
    pub mtime: i64,
}

impl VectorDB {
    /// Open or create database at path
    pub fn open(db_path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(db_path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                folder TEXT NOT NULL,
                path TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                mtime INTEGER NOT NULL,
                indexed_at INTEGER NOT NULL,
                PRIMARY KEY (folder, path)
            );

            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                folder TEXT NOT NULL,
                path TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                start_line INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_folder ON chunks(folder);
            CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(folder, path);
            "#,
        )
    }

    /// Content hash of every indexed file in `folder`, keyed by path.
    pub fn file_hashes(&self, folder: &str) -> rusqlite::Result<HashMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, content_hash FROM files WHERE folder = ?1")?;
        let rows = stmt.query_map(params![folder], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect()
    }

    /// Replace all chunks of one file in a single transaction.
    pub fn replace_file(
        &mut self,
        folder: &str,
        file: &FileRecord,
        chunks: &[(ChunkDraft, Vec<f32>)],
    ) -> rusqlite::Result<()> {
        let now = chrono::Utc::now().timestamp();
        let tx = self.conn.transaction()?;

        tx.execute(
            "DELETE FROM chunks WHERE folder = ?1 AND path = ?2",
            params![folder, file.path],
        )?;
        {
            let mut insert = tx.prepare(
                r#"
                INSERT INTO chunks (folder, path, chunk_index, start_line, content, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for (draft, embedding) in chunks {
                insert.execute(params![
                    folder,
                    file.path,
                    draft.index as i64,
                    draft.start_line as i64,
                    draft.content,
                    embedding_to_blob(embedding),
                ])?;
            }
        }
        tx.execute(
            r#"
            INSERT INTO files (folder, path, content_hash, mtime, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(folder, path) DO UPDATE SET
                content_hash = excluded.content_hash,
                mtime = excluded.mtime,
                indexed_at = excluded.indexed_at
            "#,
            params![folder, file.path, file.content_hash, file.mtime, now],
        )?;

        tx.commit()
    }

    pub fn remove_file(&mut self, folder: &str, path: &str) -> rusqlite::Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM chunks WHERE folder = ?1 AND path = ?2",
            params![folder, path],
        )?;
        tx.execute(
            "DELETE FROM files WHERE folder = ?1 AND path = ?2",
            params![folder, path],
        )?;
        tx.commit()
    }

    /// Drop every row of `folder`. Returns the number of files removed.
    pub fn clear_folder(&mut self, folder: &str) -> rusqlite::Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM chunks WHERE folder = ?1", params![folder])?;
        let files = tx.execute("DELETE FROM files WHERE folder = ?1", params![folder])?;
        tx.execute(
            "DELETE FROM index_meta WHERE key = ?1",
            params![embedder_key(folder)],
        )?;
        tx.commit()?;
        Ok(files)
    }

    /// Every chunk of `folder` with its embedding, in insertion order.
    pub fn load_chunks(&self, folder: &str) -> rusqlite::Result<Vec<(ChunkRecord, Vec<f32>)>> {
        // O(n) scan; fine for small corpora.
        let mut stmt = self.conn.prepare(
            r#"
            SELECT path, chunk_index, start_line, content, embedding
            FROM chunks
            WHERE folder = ?1
            ORDER BY id
            "#,
        )?;

        let rows = stmt.query_map(params![folder], |row| {
            let chunk_index: i64 = row.get(1)?;
            let start_line: i64 = row.get(2)?;
            let blob: Vec<u8> = row.get(4)?;
            Ok((
                ChunkRecord {
                    path: row.get(0)?,
                    chunk_index: chunk_index as usize,
                    start_line: start_line as usize,
                    content: row.get(3)?,
                },
                blob_to_embedding(&blob),
            ))
        })?;

        rows.collect()
    }

    pub fn get_stats(&self, folder: &str) -> rusqlite::Result<FolderStats> {
        let files: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM files WHERE folder = ?1",
            params![folder],
            |row| row.get(0),
        )?;
        let chunks: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE folder = ?1",
            params![folder],
            |row| row.get(0),
        )?;
        let last_indexed: Option<i64> = self
            .conn
            .query_row(
                "SELECT MAX(indexed_at) FROM files WHERE folder = ?1",
                params![folder],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        Ok(FolderStats {
            files: files as usize,
            chunks: chunks as usize,
            last_indexed,
            embedder: self.embedder_for(folder)?,
        })
    }

    /// Embedder id the folder was last indexed with.
    pub fn embedder_for(&self, folder: &str) -> rusqlite::Result<Option<String>> {
        self.get_meta(&embedder_key(folder))
    }

    pub fn set_embedder_for(&self, folder: &str, embedder_id: &str) -> rusqlite::Result<()> {
        self.set_meta(&embedder_key(folder), embedder_id)
    }

    fn set_meta(&self, key: &str, value: &str) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO index_meta (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_meta(&self, key: &str) -> rusqlite::Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map(Option::flatten)
    }
}

fn embedder_key(folder: &str) -> String {
    format!("embedder:{}", folder)
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(index: usize, content: &str) -> ChunkDraft {
        ChunkDraft {
            index,
            start_line: index * 10 + 1,
            content: content.to_string(),
        }
    }

    fn file<'a>(path: &'a str, hash: &'a str) -> FileRecord<'a> {
        FileRecord {
            path,
            content_hash: hash,
            mtime: 1_704_067_200,
        }
    }

    #[test]
    fn test_blob_conversion() {
        let embedding = vec![1.0, 2.0, 3.0, -0.5];
        assert_eq!(blob_to_embedding(&embedding_to_blob(&embedding)), embedding);
    }

    #[test]
    fn test_replace_file_overwrites_chunks() -> rusqlite::Result<()> {
        let mut db = VectorDB::open_in_memory()?;
        db.replace_file(
            "/corpus",
            &file("/corpus/a.ts", "h1"),
            &[(draft(0, "old one"), vec![1.0]), (draft(1, "old two"), vec![1.0])],
        )?;
        db.replace_file("/corpus", &file("/corpus/a.ts", "h2"), &[(draft(0, "new"), vec![0.5])])?;

        let chunks = db.load_chunks("/corpus")?;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].0.content, "new");
        assert_eq!(chunks[0].1, vec![0.5]);
        assert_eq!(db.file_hashes("/corpus")?.get("/corpus/a.ts").map(String::as_str), Some("h2"));
        Ok(())
    }

    #[test]
    fn test_folders_are_isolated() -> rusqlite::Result<()> {
        let mut db = VectorDB::open_in_memory()?;
        db.replace_file("/one", &file("/one/a.md", "h"), &[(draft(0, "a"), vec![1.0])])?;
        db.replace_file("/two", &file("/two/b.md", "h"), &[(draft(0, "b"), vec![1.0])])?;
        db.set_embedder_for("/one", "harmonic:d384")?;

        assert_eq!(db.clear_folder("/one")?, 1);
        assert!(db.load_chunks("/one")?.is_empty());
        assert_eq!(db.load_chunks("/two")?.len(), 1);
        assert_eq!(db.embedder_for("/one")?, None);

        // clearing twice is a no-op
        assert_eq!(db.clear_folder("/one")?, 0);
        Ok(())
    }

    #[test]
    fn test_stats_and_remove() -> rusqlite::Result<()> {
        let mut db = VectorDB::open_in_memory()?;
        db.replace_file(
            "/c",
            &file("/c/a.md", "h"),
            &[(draft(0, "a"), vec![1.0]), (draft(1, "b"), vec![1.0])],
        )?;
        db.replace_file("/c", &file("/c/b.md", "h"), &[(draft(0, "c"), vec![1.0])])?;

        let stats = db.get_stats("/c")?;
        assert_eq!((stats.files, stats.chunks), (2, 3));
        assert!(stats.last_indexed.is_some());

        db.remove_file("/c", "/c/a.md")?;
        let stats = db.get_stats("/c")?;
        assert_eq!((stats.files, stats.chunks), (1, 1));
        Ok(())
    }
}
