//! Per-run staging area.
//!
//! Everything that gets rewritten or patched is first copied here. Code that
//! mutates files takes a [`StagedPath`], which can only be obtained from a
//! [`StagingArea`] after checking that the path really lies inside it, so the
//! original content root is never written to.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use uuid::Uuid;
use walkdir::WalkDir;

/// Staging failures
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Staging I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Path is outside the staging area: {0}")]
    OutsideStaging(PathBuf),
}

impl StagingError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A path verified to lie inside the staging area
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StagedPath(PathBuf);

impl StagedPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for StagedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Temporary working directory for one run, removed on drop
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    /// Canonical form of `dir`, used for containment checks
    canonical_root: PathBuf,
}

impl StagingArea {
    /// Create a staging area under the system temp directory
    pub fn new() -> Result<Self, StagingError> {
        let dir = tempfile::Builder::new()
            .prefix("ekshiksha-staging-")
            .tempdir()
            .map_err(|e| StagingError::io(&std::env::temp_dir(), e))?;
        Self::from_tempdir(dir)
    }

    /// Create a staging area under a specific parent directory
    pub fn new_in(parent: &Path) -> Result<Self, StagingError> {
        fs::create_dir_all(parent).map_err(|e| StagingError::io(parent, e))?;
        let dir = tempfile::Builder::new()
            .prefix("ekshiksha-staging-")
            .tempdir_in(parent)
            .map_err(|e| StagingError::io(parent, e))?;
        Self::from_tempdir(dir)
    }

    fn from_tempdir(dir: TempDir) -> Result<Self, StagingError> {
        let canonical_root = dir
            .path()
            .canonicalize()
            .map_err(|e| StagingError::io(dir.path(), e))?;
        Ok(Self {
            dir,
            canonical_root,
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Verify that an existing path lies inside the staging area
    pub fn guard(&self, path: &Path) -> Result<StagedPath, StagingError> {
        let canonical = path.canonicalize().map_err(|e| StagingError::io(path, e))?;
        if canonical.starts_with(&self.canonical_root) {
            Ok(StagedPath(canonical))
        } else {
            Err(StagingError::OutsideStaging(path.to_path_buf()))
        }
    }

    /// Create a fresh, uniquely named workspace directory for one unit of work
    pub fn workspace(&self, label: &str) -> Result<StagedPath, StagingError> {
        let slug: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let unique = Uuid::new_v4().simple().to_string();
        let dir = self
            .canonical_root
            .join(format!("{}-{}", slug, &unique[..8]));

        fs::create_dir_all(&dir).map_err(|e| StagingError::io(&dir, e))?;
        Ok(StagedPath(dir))
    }

    /// Recursively copy `src` into a new directory `name` under `parent`
    pub fn copy_tree(
        &self,
        src: &Path,
        parent: &StagedPath,
        name: &str,
    ) -> Result<StagedPath, StagingError> {
        let dest = parent.as_path().join(name);
        copy_dir_all(src, &dest)?;
        self.guard(&dest)
    }
}

/// Copy a directory tree, following symlinks the way the content archive expects
fn copy_dir_all(src: &Path, dest: &Path) -> Result<(), StagingError> {
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(|source| StagingError::Walk {
            path: src.to_path_buf(),
            source,
        })?;

        // WalkDir yields paths under src, so strip_prefix cannot fail
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| StagingError::io(&target, e))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| StagingError::io(entry.path(), e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_rejects_outside_paths() {
        let staging = StagingArea::new().unwrap();
        let outside = TempDir::new().unwrap();
        let file = outside.path().join("three.js");
        fs::write(&file, "x").unwrap();

        assert!(matches!(
            staging.guard(&file),
            Err(StagingError::OutsideStaging(_))
        ));
    }

    #[test]
    fn test_guard_rejects_dot_dot_escape() {
        let staging = StagingArea::new().unwrap();
        let work = staging.workspace("item").unwrap();
        let sneaky = work.as_path().join("..").join("..");

        assert!(staging.guard(&sneaky).is_err());
    }

    #[test]
    fn test_workspaces_are_unique() {
        let staging = StagingArea::new().unwrap();
        let a = staging.workspace("apps/x").unwrap();
        let b = staging.workspace("apps/x").unwrap();

        assert_ne!(a, b);
        assert!(a.as_path().starts_with(staging.guard(staging.root()).unwrap().as_path()));
    }

    #[test]
    fn test_copy_tree() {
        let src = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("js/lib")).unwrap();
        fs::write(src.path().join("index.html"), "<html></html>").unwrap();
        fs::write(src.path().join("js/lib/a.js"), "var a;").unwrap();

        let staging = StagingArea::new().unwrap();
        let work = staging.workspace("copy").unwrap();
        let copied = staging.copy_tree(src.path(), &work, "content").unwrap();

        assert_eq!(
            fs::read_to_string(copied.as_path().join("js/lib/a.js")).unwrap(),
            "var a;"
        );
        assert!(copied.as_path().join("index.html").exists());
    }

    #[test]
    fn test_removed_on_drop() {
        let staging = StagingArea::new().unwrap();
        let root = staging.root().to_path_buf();
        drop(staging);
        assert!(!root.exists());
    }
}
