use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{find_in, IncludeRequest, IncludeResolutionStrategy, IncludeSet};
use crate::analyzer::scanner::include_directives;
use crate::error::Result;
use crate::paths::normalize_path;

/// Recursive textual include scan.
///
/// Macro-unaware: every `#include` line counts, whatever conditional it sits
/// in. Quoted includes are searched in the includer's directory, the project
/// root, the configured include dirs and finally the project header
/// directory. `<...>` includes are recorded by name only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextualStrategy;

impl TextualStrategy {
    pub fn new() -> Self {
        Self
    }

    fn search(&self, name: &str, includer: &Path, request: &IncludeRequest) -> Option<PathBuf> {
        let includer_dir = includer.parent();
        let dirs = includer_dir
            .into_iter()
            .chain(std::iter::once(request.project_root.as_path()))
            .chain(request.include_dirs.iter().map(PathBuf::as_path))
            .chain(request.header_root.as_deref());
        find_in(name, dirs)
    }
}

impl IncludeResolutionStrategy for TextualStrategy {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn resolve(&self, source: &Path, request: &IncludeRequest) -> Result<IncludeSet> {
        let mut set = IncludeSet::default();
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut pending = vec![normalize_path(source)];

        while let Some(file) = pending.pop() {
            if !visited.insert(file.clone()) {
                continue;
            }

            let text = match std::fs::read(&file) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    tracing::debug!("Skipping unreadable {}: {}", file.display(), e);
                    continue;
                }
            };

            for directive in include_directives(&text) {
                if directive.system {
                    set.record_unresolved(&directive.name, true);
                    continue;
                }
                match self.search(&directive.name, &file, request) {
                    Some(path) => {
                        set.record_resolved(&directive.name, path.clone());
                        if !visited.contains(&path) {
                            pending.push(path);
                        }
                    }
                    None => set.record_unresolved(&directive.name, false),
                }
            }
        }

        Ok(set)
    }
}
