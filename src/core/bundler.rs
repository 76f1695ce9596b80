//! Dependency bundle: shared assets + shared libraries in one archive.
//!
//! Built once per run before any content is packaged. Its identity is then
//! passed explicitly to every packaging call.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use super::archive::{ArchiveCache, ArchiveError};
use super::rewrite::is_rendering_lib;
use super::staging::{StagedPath, StagingArea, StagingError};
use crate::config::paths::{ContentLayout, ASSETS_DIR, ENTRY_PAGE, SHARED_LIB_DIR};
use crate::domain::DependencyBundle;

/// Appended to every staged copy of the rendering library
pub const CROSS_ORIGIN_PATCH: &str = "if (window.origin !== window.location.origin) { THREE.TextureLoader.prototype.crossOrigin = 'anonymous'; }";

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Shared source directory missing: {}", .0.display())]
    MissingSource(PathBuf),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// Make the rendering library load cross-origin textures anonymously.
///
/// Only staged copies can be patched. Returns false when the file already
/// carries the patch.
pub fn patch_rendering_lib(path: &StagedPath) -> Result<bool, StagingError> {
    let file = path.as_path();
    let data = fs::read(file).map_err(|e| StagingError::io(file, e))?;
    if data.ends_with(CROSS_ORIGIN_PATCH.as_bytes()) {
        return Ok(false);
    }

    let mut out = OpenOptions::new()
        .append(true)
        .open(file)
        .map_err(|e| StagingError::io(file, e))?;
    out.write_all(CROSS_ORIGIN_PATCH.as_bytes())
        .map_err(|e| StagingError::io(file, e))?;

    debug!("Patched rendering library {}", file.display());
    Ok(true)
}

/// Patch every rendering library copy below a staged directory
pub fn patch_rendering_libs_in(
    staging: &StagingArea,
    dir: &StagedPath,
) -> Result<usize, StagingError> {
    let mut patched = 0;
    for entry in WalkDir::new(dir.as_path()) {
        let entry = entry.map_err(|source| StagingError::Walk {
            path: dir.as_path().to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() && is_rendering_lib(&entry.file_name().to_string_lossy())
        {
            if patch_rendering_lib(&staging.guard(entry.path())?)? {
                patched += 1;
            }
        }
    }
    Ok(patched)
}

/// Build and cache the dependency bundle
#[instrument(skip_all, fields(root = %layout.root().display()))]
pub fn build_dependency_bundle(
    layout: &ContentLayout,
    staging: &StagingArea,
    cache: &ArchiveCache,
) -> Result<DependencyBundle, BundleError> {
    let assets = layout.assets_dir();
    let shared_lib = layout.shared_lib_dir();
    for source in [&assets, &shared_lib] {
        if !source.is_dir() {
            return Err(BundleError::MissingSource(source.clone()));
        }
    }

    let work = staging.workspace("dependency_bundle")?;
    staging.copy_tree(&assets, &work, ASSETS_DIR)?;
    let staged_lib = staging.copy_tree(&shared_lib, &work, SHARED_LIB_DIR)?;

    let patched = patch_rendering_libs_in(staging, &staged_lib)?;

    // Never rendered, but every archive must carry an entry page
    let index = work.as_path().join(ENTRY_PAGE);
    fs::write(&index, b"").map_err(|e| StagingError::io(&index, e))?;

    let insert = cache.archive_dir(&work)?;
    info!(
        hash = %insert.archive.hash,
        patched,
        reused = insert.reused,
        "Dependency bundle ready"
    );

    Ok(DependencyBundle::new(insert.archive))
}
