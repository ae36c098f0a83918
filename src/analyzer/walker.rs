use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

/// Lists C sources and headers under a directory.
///
/// Only the top level is visited unless the walker is recursive.
pub struct SourceWalker {
    recursive: bool,
}

impl SourceWalker {
    pub fn new(recursive: bool) -> Self {
        Self { recursive }
    }

    /// Returns files under `root` whose extension is in `extensions`, sorted.
    pub fn walk(&self, root: &Path, extensions: &[&str]) -> Vec<PathBuf> {
        if !root.is_dir() {
            tracing::debug!("Skipping missing directory {}", root.display());
            return Vec::new();
        }

        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .ignore(true)
            .max_depth(if self.recursive { None } else { Some(1) })
            .build();

        let mut files: Vec<PathBuf> = walker
            .flatten()
            .map(|entry| entry.into_path())
            .filter(|path| path.is_file() && Self::has_extension(path, extensions))
            .collect();
        files.sort();
        files
    }

    /// Headers of the `include/` root.
    pub fn headers(&self, root: &Path) -> Vec<PathBuf> {
        self.walk(root, &["h"])
    }

    /// Translation units (and private headers) of the `src/` root.
    pub fn sources(&self, root: &Path) -> Vec<PathBuf> {
        self.walk(root, &["c", "h"])
    }

    pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }
}
