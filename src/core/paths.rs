use std::path::{Component, Path, PathBuf};

/// Locations the pipeline reads from and writes to, all anchored at the
/// project root.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub qa_set: PathBuf,
    pub db: PathBuf,
}

impl ProjectPaths {
    pub fn from_root(root: PathBuf) -> Self {
        Self {
            qa_set: root.join("data/qa-set.json"),
            db: root.join(".rag/index.db"),
            root,
        }
    }

    /// Resolve a possibly relative path against the project root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Render `path` relative to the project root with `/` separators.
    ///
    /// Paths outside the root are walked up with `..` segments; paths that
    /// share no prefix with the root (other drive, relative input) are
    /// returned unchanged.
    pub fn relative_to_root(&self, path: &Path) -> String {
        if !path.is_absolute() {
            return to_slash(path);
        }
        if let Ok(stripped) = path.strip_prefix(&self.root) {
            return to_slash(stripped);
        }

        let root: Vec<Component> = self.root.components().collect();
        let target: Vec<Component> = path.components().collect();
        let shared = root
            .iter()
            .zip(target.iter())
            .take_while(|(a, b)| a == b)
            .count();
        if shared == 0 {
            return to_slash(path);
        }

        let mut parts: Vec<String> = vec!["..".to_string(); root.len() - shared];
        parts.extend(
            target[shared..]
                .iter()
                .map(|c| c.as_os_str().to_string_lossy().to_string()),
        );
        parts.join("/")
    }
}

fn to_slash(path: &Path) -> String {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}
