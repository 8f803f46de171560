//! C1: canonical file identity.
//!
//! A [`FileKey`] is the sole identity the rest of the engine uses for a
//! source file — the data store, code maps, sourcemaps, and caches are all
//! keyed by it. Two different OS-native representations of the same path
//! (backslashes on Windows, repeated separators, a trailing slash) must
//! normalize to the same `FileKey`.

use std::fmt;

use crate::error::{CoverageError, Result};

/// A canonicalized, forward-slash-separated path used as the identity of a
/// source file throughout the engine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileKey(String);

impl FileKey {
    /// Normalizes `path` into a [`FileKey`].
    ///
    /// - Backslashes become forward slashes.
    /// - `.` segments are dropped.
    /// - `..` segments pop the previous segment (when there is one to pop).
    /// - Repeated `/` are collapsed.
    /// - A trailing `/` is stripped, unless the whole key is `/`.
    pub fn normalize(path: &str) -> Result<FileKey> {
        if path.is_empty() {
            return Err(CoverageError::InvalidPath(
                "path must not be empty".to_string(),
            ));
        }

        let is_absolute = path.starts_with('/') || path.starts_with('\\');
        let mut segments: Vec<&str> = Vec::new();
        for raw_segment in path.split(['/', '\\']) {
            match raw_segment {
                "" | "." => continue,
                ".." => {
                    if matches!(segments.last(), Some(s) if *s != "..") {
                        segments.pop();
                    } else if !is_absolute {
                        segments.push("..");
                    }
                }
                seg => segments.push(seg),
            }
        }

        let joined = segments.join("/");
        let normalized = if is_absolute {
            format!("/{joined}")
        } else if joined.is_empty() {
            ".".to_string()
        } else {
            joined
        };

        Ok(FileKey(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FileKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path_is_invalid() {
        assert!(FileKey::normalize("").is_err());
    }

    #[test]
    fn normalizes_backslashes() {
        let a = FileKey::normalize("C:\\src\\foo.lua").unwrap();
        let b = FileKey::normalize("C:/src/foo.lua").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn collapses_duplicate_separators() {
        let a = FileKey::normalize("/src//foo.lua").unwrap();
        let b = FileKey::normalize("/src/foo.lua").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn drops_trailing_slash() {
        let a = FileKey::normalize("/src/foo/").unwrap();
        assert_eq!(a.as_str(), "/src/foo");
    }

    #[test]
    fn drops_dot_segments() {
        let a = FileKey::normalize("/src/./foo.lua").unwrap();
        assert_eq!(a.as_str(), "/src/foo.lua");
    }

    #[test]
    fn resolves_parent_segments() {
        let a = FileKey::normalize("/src/sub/../foo.lua").unwrap();
        assert_eq!(a.as_str(), "/src/foo.lua");
    }

    #[test]
    fn is_idempotent() {
        let once = FileKey::normalize("/src//sub/../foo.lua").unwrap();
        let twice = FileKey::normalize(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }
}
