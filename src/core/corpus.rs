use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use walkdir::{DirEntry, WalkDir};

/// The folder being indexed plus its filtering rules.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub path: PathBuf,
    /// Extensions with a leading dot, e.g. `.ts`.
    pub include_extensions: Vec<String>,
    /// Directory names skipped at any depth.
    pub exclude_folders: Vec<String>,
}

impl Corpus {
    pub fn new(path: PathBuf, include_extensions: Vec<String>, exclude_folders: Vec<String>) -> Self {
        Self {
            path,
            include_extensions: include_extensions
                .into_iter()
                .map(|ext| normalize_extension(&ext))
                .filter(|ext| ext.len() > 1)
                .collect(),
            exclude_folders,
        }
    }
}

pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim();
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{}", ext)
    }
}

/// A corpus file loaded for indexing.
pub struct SourceFile {
    pub path: PathBuf,
    pub content: String,
    pub content_hash: String,
    pub modified: DateTime<Local>,
}

impl SourceFile {
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let bytes = fs::read(path)?;
        let metadata = fs::metadata(path)?;
        let content_hash = blake3::hash(&bytes).to_hex().to_string();
        let content = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).to_string(),
        };

        Ok(Self {
            path: path.to_path_buf(),
            content,
            content_hash,
            modified: DateTime::from(metadata.modified()?),
        })
    }
}

/// List files under `root` whose extension is included and which do not sit
/// inside an excluded folder. Sorted for a stable indexing order.
///
/// A missing root yields an empty list.
pub fn collect_source_files(
    root: &Path,
    include_extensions: &[String],
    exclude_folders: &[String],
) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !is_excluded_dir(entry, exclude_folders))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| has_included_extension(entry.path(), include_extensions))
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

fn is_excluded_dir(entry: &DirEntry, exclude_folders: &[String]) -> bool {
    // The root itself is never excluded, even if its name matches.
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| exclude_folders.iter().any(|excluded| excluded == name))
            .unwrap_or(false)
}

fn has_included_extension(path: &Path, include_extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            include_extensions
                .iter()
                .any(|included| included.strip_prefix('.') == Some(ext))
        })
        .unwrap_or(false)
}
