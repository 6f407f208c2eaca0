use std::{
    fmt,
    path::{Path, PathBuf},
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathValidationError {
    #[error("path is not absolute: {0}")]
    NotAbsolute(PathBuf),
}

/// An absolute, validated filesystem path.
///
/// Construction is the only place absoluteness is checked; every other
/// method assumes it already holds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AbsPath(PathBuf);

impl AbsPath {
    /// Validates that `path` is absolute and wraps it.
    ///
    /// # Arguments
    ///
    /// * `path`: the path to validate.
    ///
    /// returns: Result<AbsPath, PathValidationError>
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, PathValidationError> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(PathValidationError::NotAbsolute(path));
        }
        Ok(Self(path))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn join(&self, rel: impl AsRef<Path>) -> Self {
        Self(self.0.join(rel))
    }

    pub fn parent(&self) -> Option<Self> {
        self.0.parent().map(|p| Self(p.to_path_buf()))
    }

    /// The path relative to `root`, or `None` if `self` is not under `root`.
    pub fn relative_to(&self, root: &AbsPath) -> Option<PathBuf> {
        self.0.strip_prefix(&root.0).ok().map(|p| p.to_path_buf())
    }

    pub fn starts_with(&self, root: &AbsPath) -> bool {
        self.0.starts_with(&root.0)
    }
}

impl fmt::Display for AbsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for AbsPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// The absolute path of a source file the user authored.
pub type SourcePath = AbsPath;

/// The absolute path of the package root enclosing a [`SourcePath`].
/// Identifies a build group.
pub type GroupRoot = AbsPath;

/// Walks upward from `start` (a file or directory) looking for a directory
/// containing `manifest_name`. Mirrors the nearest-ancestor-manifest walk
/// used to locate a workspace/package root.
pub fn find_nearest_manifest_root(start: &Path, manifest_name: &str) -> Option<PathBuf> {
    let mut dir = if start.is_dir() {
        Some(start)
    } else {
        start.parent()
    };
    while let Some(candidate) = dir {
        if candidate.join(manifest_name).is_file() {
            return Some(candidate.to_path_buf());
        }
        dir = candidate.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_relative_paths() {
        assert!(AbsPath::new("relative/path").is_err());
    }

    #[test]
    fn accepts_absolute_paths() {
        assert!(AbsPath::new("/tmp/foo").is_ok());
    }

    #[test]
    fn relative_to_strips_prefix() {
        let root = AbsPath::new("/repo").unwrap();
        let file = AbsPath::new("/repo/src/a.ts").unwrap();
        assert_eq!(
            file.relative_to(&root),
            Some(PathBuf::from("src/a.ts"))
        );
    }

    #[test]
    fn find_nearest_manifest_root_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let pkg_root = dir.path().join("pkg");
        let nested = pkg_root.join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(pkg_root.join("package.json"), "{}").unwrap();

        let found = find_nearest_manifest_root(&nested.join("file.ts"), "package.json");
        assert_eq!(found, Some(pkg_root));
    }
}
