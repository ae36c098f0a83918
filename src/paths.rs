//! Path normalisation shared by the build database and include resolution.

use std::path::{Component, Path, PathBuf};

/// Removes `.` and resolves `..` components without touching the filesystem.
pub fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last_is_normal = matches!(out.components().last(), Some(Component::Normal(_)));
                if last_is_normal {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Joins `path` onto `base` when it is relative, then cleans it.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        lexical_clean(path)
    } else {
        lexical_clean(&base.join(path))
    }
}

/// Canonical form of `path` when it exists, lexically cleaned otherwise.
pub fn normalize_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| lexical_clean(path))
}

/// `path` relative to `root` with `/` separators, or the whole path when it
/// lies outside `root`.
pub fn relative_label(root: &Path, path: &Path) -> String {
    let root = normalize_path(root);
    match path.strip_prefix(&root) {
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexical_clean() {
        assert_eq!(lexical_clean(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(lexical_clean(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(lexical_clean(Path::new("/../x")), PathBuf::from("/x"));
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(
            absolutize(Path::new("/proj/build"), Path::new("../include")),
            PathBuf::from("/proj/include")
        );
        assert_eq!(
            absolutize(Path::new("/proj"), Path::new("/usr/include")),
            PathBuf::from("/usr/include")
        );
    }

    #[test]
    fn test_normalize_existing_path() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let nested = temp_dir.path().join("x");
        std::fs::create_dir(&nested).unwrap();
        let dotted = temp_dir.path().join("x/../x/.");
        assert_eq!(normalize_path(&dotted), std::fs::canonicalize(&nested).unwrap());
    }

    #[test]
    fn test_relative_label() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let root = normalize_path(temp_dir.path());
        std::fs::create_dir_all(root.join("src/net")).unwrap();

        assert_eq!(relative_label(&root, &root.join("src/net/config.h")), "src/net/config.h");
        assert_eq!(relative_label(&root, Path::new("/usr/include/stdio.h")), "/usr/include/stdio.h");
    }
}
