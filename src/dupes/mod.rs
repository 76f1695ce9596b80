//! Duplicate file detection across a content root.
//!
//! Finds every copy of a file name (case-insensitive), groups the copies by
//! content hash, and can write one representative per group. Used to see how
//! many distinct versions of a shared library are really in circulation, so
//! patching and consolidation only have to handle those versions.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, instrument};
use walkdir::WalkDir;

use crate::core::archive::hash_file;

/// Content hash -> paths of byte-identical copies
pub type DuplicateGroups = BTreeMap<String, Vec<PathBuf>>;

#[derive(Debug, Error)]
pub enum DuplicateError {
    #[error("Content root does not exist: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("Identical files with different extensions in group {hash}: {expected:?} vs {found:?} ({})", .path.display())]
    ExtensionMismatch {
        hash: String,
        expected: String,
        found: String,
        path: PathBuf,
    },

    #[error("Duplicate group {0} has no files")]
    EmptyGroup(String),

    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DuplicateError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Extension with its leading dot, or empty
fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

/// Scans one content root
#[derive(Debug, Clone)]
pub struct DupeFinder {
    content_root: PathBuf,
}

impl DupeFinder {
    pub fn new(content_root: impl Into<PathBuf>) -> Result<Self, DuplicateError> {
        let content_root = content_root.into();
        if !content_root.is_dir() {
            return Err(DuplicateError::RootNotFound(content_root));
        }
        Ok(Self { content_root })
    }

    pub fn content_root(&self) -> &Path {
        &self.content_root
    }

    /// Group all files named `file_name` (any case) by content hash
    #[instrument(skip(self), fields(root = %self.content_root.display()))]
    pub fn find_duplicates(&self, file_name: &str) -> Result<DuplicateGroups, DuplicateError> {
        let wanted = file_name.to_lowercase();
        let mut groups = DuplicateGroups::new();
        let mut matches = 0usize;

        for entry in WalkDir::new(&self.content_root).sort_by_file_name() {
            let entry = entry.map_err(|source| DuplicateError::Walk {
                path: self.content_root.clone(),
                source,
            })?;
            if !entry.file_type().is_file()
                || entry.file_name().to_string_lossy().to_lowercase() != wanted
            {
                continue;
            }

            matches += 1;
            let hash = hash_file(entry.path()).map_err(|e| DuplicateError::io(entry.path(), e))?;
            groups.entry(hash).or_default().push(entry.into_path());
        }

        info!(matches, versions = groups.len(), "Scanned for {}", file_name);
        Ok(groups)
    }

    /// Write one `<hash><ext>` representative per group into `output_dir`
    pub fn output_duplicates(
        &self,
        groups: &DuplicateGroups,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, DuplicateError> {
        output_duplicates(groups, output_dir)
    }
}

/// Write one `<hash><ext>` representative per group into `output_dir`.
///
/// Every path in a group must share one extension; a mismatch means the
/// source data breaks an assumption and is reported instead of guessed at.
pub fn output_duplicates(
    groups: &DuplicateGroups,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, DuplicateError> {
    fs::create_dir_all(output_dir).map_err(|e| DuplicateError::io(output_dir, e))?;

    let mut written = Vec::with_capacity(groups.len());
    for (hash, paths) in groups {
        let (first, rest) = paths
            .split_first()
            .ok_or_else(|| DuplicateError::EmptyGroup(hash.clone()))?;

        let ext = dotted_extension(first);
        if let Some(odd) = rest.iter().find(|p| dotted_extension(p) != ext) {
            return Err(DuplicateError::ExtensionMismatch {
                hash: hash.clone(),
                expected: ext,
                found: dotted_extension(odd),
                path: odd.clone(),
            });
        }

        // Copies are identical, any one will do
        let target = output_dir.join(format!("{}{}", hash, ext));
        fs::copy(first, &target).map_err(|e| DuplicateError::io(first, e))?;
        written.push(target);
    }

    Ok(written)
}
