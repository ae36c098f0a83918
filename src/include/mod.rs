//! Include resolution
//!
//! Computes the transitive header set of a translation unit. Two strategies
//! share one interface: a preprocessor-aware walk over a tree-sitter parse
//! that honours conditional compilation, and a textual recursive scan used
//! when the former is unavailable or fails.

pub mod fallback;
pub mod precise;
pub mod resolver;

pub use fallback::TextualStrategy;
pub use precise::{MacroTable, PreprocessorStrategy};
pub use resolver::{IncludeResolver, Resolution, StrategyMode};

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::build::BuildConfig;
use crate::error::Result;
use crate::paths::normalize_path;

/// Headers reachable from one translation unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeSet {
    /// Every header name reached, as written in the directive
    pub headers: BTreeSet<String>,
    /// Headers located on disk, keyed by resolved path
    ///
    /// Two files included under the same name both appear. A file reached
    /// under several spellings keeps the smallest one.
    pub paths: BTreeMap<PathBuf, String>,
    /// `<...>` headers that were not located
    pub system: BTreeSet<String>,
}

impl IncludeSet {
    pub fn record_resolved(&mut self, name: &str, path: PathBuf) {
        self.headers.insert(name.to_string());
        self.system.remove(name);
        match self.paths.get_mut(&path) {
            Some(existing) if existing.as_str() > name => *existing = name.to_string(),
            Some(_) => {}
            None => {
                self.paths.insert(path, name.to_string());
            }
        }
    }

    pub fn record_unresolved(&mut self, name: &str, system: bool) {
        self.headers.insert(name.to_string());
        if system && !self.is_resolved(name) {
            self.system.insert(name.to_string());
        }
    }

    /// Whether some directive named `name` was located on disk.
    pub fn is_resolved(&self, name: &str) -> bool {
        self.paths.values().any(|n| n == name)
    }

    /// Paths located for directives named `name`, in path order.
    pub fn paths_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Path> + 'a {
        self.paths
            .iter()
            .filter(move |(_, n)| n.as_str() == name)
            .map(|(path, _)| path.as_path())
    }

    /// Quoted includes that could not be found on any search path.
    pub fn unresolved(&self) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|h| !self.is_resolved(h) && !self.system.contains(*h))
            .map(String::as_str)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// Inputs of one include resolution.
#[derive(Debug, Clone, Default)]
pub struct IncludeRequest {
    pub project_root: PathBuf,
    /// Conventional header directory of the project (`include/`)
    pub header_root: Option<PathBuf>,
    /// Absolute include dirs from the build configuration
    pub include_dirs: Vec<PathBuf>,
    pub defines: BTreeMap<String, Option<String>>,
    pub timeout: Option<Duration>,
}

impl IncludeRequest {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Default::default()
        }
    }

    pub fn with_header_root(mut self, header_root: impl Into<PathBuf>) -> Self {
        self.header_root = Some(header_root.into());
        self
    }

    pub fn with_build_config(mut self, config: &BuildConfig) -> Self {
        self.include_dirs = config.resolved_include_dirs();
        self.defines = config.defines.clone();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A way of computing the header closure of a translation unit.
pub trait IncludeResolutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn resolve(&self, source: &Path, request: &IncludeRequest) -> Result<IncludeSet>;
}

/// Returns the first `dir/name` that is an existing file.
pub(crate) fn find_in<'a>(name: &str, dirs: impl IntoIterator<Item = &'a Path>) -> Option<PathBuf> {
    dirs.into_iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
        .map(|found| normalize_path(&found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{BuildConfigParser, RawEntry};

    #[test]
    fn test_include_set_unresolved() {
        let mut set = IncludeSet::default();
        set.record_resolved("db.h", PathBuf::from("/p/include/db.h"));
        set.record_unresolved("missing.h", false);
        set.record_unresolved("stdio.h", true);

        assert_eq!(set.unresolved(), vec!["missing.h"]);
        assert_eq!(set.headers.len(), 3);
        assert!(set.system.contains("stdio.h"));
    }

    #[test]
    fn test_include_set_resolution_overrides_system() {
        let mut set = IncludeSet::default();
        set.record_unresolved("cfg.h", true);
        set.record_resolved("cfg.h", PathBuf::from("/p/cfg.h"));
        assert!(set.system.is_empty());

        set.record_unresolved("cfg.h", true);
        assert!(set.system.is_empty());
    }

    #[test]
    fn test_include_set_keeps_same_named_headers() {
        let mut set = IncludeSet::default();
        set.record_resolved("config.h", PathBuf::from("/p/src/net/config.h"));
        set.record_resolved("config.h", PathBuf::from("/p/src/db/config.h"));

        let found: Vec<_> = set.paths_named("config.h").collect();
        assert_eq!(
            found,
            vec![Path::new("/p/src/db/config.h"), Path::new("/p/src/net/config.h")]
        );
        assert_eq!(set.headers.len(), 1);
        assert!(set.unresolved().is_empty());
    }

    #[test]
    fn test_include_set_smallest_spelling_wins() {
        let mut set = IncludeSet::default();
        set.record_resolved("util.h", PathBuf::from("/p/include/util.h"));
        set.record_resolved("../include/util.h", PathBuf::from("/p/include/util.h"));

        assert_eq!(set.paths.len(), 1);
        assert_eq!(set.paths[Path::new("/p/include/util.h")], "../include/util.h");
    }

    #[test]
    fn test_request_from_build_config() {
        let entry = RawEntry::new("a.c", "/p", "gcc -Iinc -DMODE=2 -c a.c");
        let config = BuildConfigParser::parse_entry(&entry);
        let request = IncludeRequest::new("/p").with_build_config(&config);

        assert_eq!(request.include_dirs, vec![PathBuf::from("/p/inc")]);
        assert_eq!(request.defines.get("MODE"), Some(&Some("2".to_string())));
    }
}
