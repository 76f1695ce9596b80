//! Deterministic archives and the content-addressed archive cache.
//!
//! Archives contain only regular files, added in lexicographic order of their
//! `/`-separated relative path, each with the same timestamp, permissions and
//! compression. Byte-identical staged trees therefore always produce
//! byte-identical archives, and the SHA-256 of the archive is its identity.
//!
//! Cache inserts write into a temp file inside the cache directory and then
//! link it into place without clobbering: the first writer for a hash wins,
//! later writers discard their (identical) copy.

use std::fs::{self, File};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::staging::StagedPath;
use crate::config::paths::ENTRY_PAGE;
use crate::domain::ArchiveRef;

/// Archive failures
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Refusing to archive {}: no index.html entry page", .0.display())]
    MissingEntryPage(PathBuf),
}

impl ArchiveError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644)
}

/// Regular files under `dir` as (archive name, absolute path), sorted by name
pub fn archive_entries(dir: &Path) -> Result<Vec<(String, PathBuf)>, ArchiveError> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|source| ArchiveError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        entries.push((name, entry.path().to_path_buf()));
    }

    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

/// Write `dir` as a deterministic zip into `writer`
pub fn write_archive<W: Write + Seek>(dir: &Path, writer: W) -> Result<W, ArchiveError> {
    let mut zip = ZipWriter::new(writer);
    let options = entry_options();

    for (name, path) in archive_entries(dir)? {
        zip.start_file(name, options)?;
        let mut file = File::open(&path).map_err(|e| ArchiveError::io(&path, e))?;
        io::copy(&mut file, &mut zip).map_err(|e| ArchiveError::io(&path, e))?;
    }

    Ok(zip.finish()?)
}

/// Hex SHA-256 of a file's bytes
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Result of inserting into the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheInsert {
    pub archive: ArchiveRef,
    /// An archive with the same hash was already cached
    pub reused: bool,
}

/// Directory of `<hash>.zip` files, append-only
#[derive(Debug, Clone)]
pub struct ArchiveCache {
    dir: PathBuf,
}

impl ArchiveCache {
    /// Open (and create if needed) a cache directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| ArchiveError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, hash: &str) -> PathBuf {
        self.dir.join(format!("{}.zip", hash))
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.path_for(hash).is_file()
    }

    /// Number of archives currently cached
    pub fn len(&self) -> Result<usize, ArchiveError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| ArchiveError::io(&self.dir, e))?;
        let mut count = 0;
        for entry in entries {
            let entry = entry.map_err(|e| ArchiveError::io(&self.dir, e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.ends_with(".zip") && !name.starts_with('.') {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool, ArchiveError> {
        Ok(self.len()? == 0)
    }

    /// Archive a staged directory and insert it under its content hash
    pub fn archive_dir(&self, staged: &StagedPath) -> Result<CacheInsert, ArchiveError> {
        let dir = staged.as_path();
        if !dir.join(ENTRY_PAGE).is_file() {
            return Err(ArchiveError::MissingEntryPage(dir.to_path_buf()));
        }

        let mut temp = tempfile::Builder::new()
            .prefix(".partial-")
            .suffix(".zip")
            .tempfile_in(&self.dir)
            .map_err(|e| ArchiveError::io(&self.dir, e))?;

        write_archive(dir, temp.as_file_mut())?;
        temp.as_file_mut()
            .sync_all()
            .map_err(|e| ArchiveError::io(temp.path(), e))?;

        let hash = hash_file(temp.path()).map_err(|e| ArchiveError::io(temp.path(), e))?;
        let dest = self.path_for(&hash);
        let reused = self.persist(temp, &dest)?;

        debug!(%hash, reused, "Archived {}", dir.display());
        Ok(CacheInsert {
            archive: ArchiveRef { hash, path: dest },
            reused,
        })
    }

    /// Move a finished temp archive into place; returns true if one already existed
    fn persist(&self, temp: tempfile::NamedTempFile, dest: &Path) -> Result<bool, ArchiveError> {
        match temp.persist_noclobber(dest) {
            Ok(_) => Ok(false),
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => Ok(true),
            Err(err) => {
                // Filesystems without hard links: fall back to rename, identical bytes either way
                if dest.is_file() {
                    return Ok(true);
                }
                err.file
                    .persist(dest)
                    .map_err(|e| ArchiveError::io(dest, e.error))?;
                Ok(false)
            }
        }
    }
}
