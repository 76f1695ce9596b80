//! Content packager: one content item in, one content-addressed archive out.
//!
//! 1. copy the item's asset directory into its own staging workspace
//! 2. rename the entry file to `index.html`
//! 3. rewrite dependency links in every staged page, patching local
//!    rendering library copies
//! 4. archive deterministically and insert into the cache by hash

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::archive::{ArchiveCache, ArchiveError};
use super::bundler::patch_rendering_lib;
use super::rewrite::{rewrite_html, RewriteError};
use super::staging::{StagedPath, StagingArea, StagingError};
use crate::config::paths::ENTRY_PAGE;
use crate::domain::{ContentItem, DependencyBundle, PackagedItem};

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("Entry file {file} not found in {}", .dir.display())]
    MissingEntryFile { dir: PathBuf, file: String },

    #[error("Invalid page pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Failed to list pages: {0}")]
    Glob(#[from] glob::GlobError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// Summary of the page rewriting step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    pub pages: usize,
    pub rewritten: usize,
    pub patched_libs: usize,
    pub needs_dependency_bundle: bool,
}

/// Package one item against an already-built dependency bundle
#[instrument(skip_all, fields(item = %item.source_id()))]
pub fn package_item(
    item: ContentItem,
    bundle: &DependencyBundle,
    staging: &StagingArea,
    cache: &ArchiveCache,
) -> Result<PackagedItem, PackageError> {
    let work = staging.workspace(&item.source_id())?;
    let staged = staging.copy_tree(&item.dir_absolute, &work, "content")?;

    promote_entry_page(&staged, &item.html_file)?;
    let summary = rewrite_pages(staging, &staged, bundle)?;
    let insert = cache.archive_dir(&staged)?;

    debug!(
        hash = %insert.archive.hash,
        reused = insert.reused,
        pages = summary.pages,
        rewritten = summary.rewritten,
        "Packaged item"
    );

    if let Err(e) = fs::remove_dir_all(work.as_path()) {
        warn!("Failed to clean staging workspace {}: {}", work.as_path().display(), e);
    }

    Ok(PackagedItem {
        item,
        archive: insert.archive,
        needs_dependency_bundle: summary.needs_dependency_bundle,
    })
}

/// Rename the entry file to the canonical entry page name
pub fn promote_entry_page(staged: &StagedPath, html_file: &str) -> Result<(), PackageError> {
    if html_file == ENTRY_PAGE {
        return Ok(());
    }

    let from = staged.as_path().join(html_file);
    if !from.is_file() {
        return Err(PackageError::MissingEntryFile {
            dir: staged.as_path().to_path_buf(),
            file: html_file.to_string(),
        });
    }

    let to = staged.as_path().join(ENTRY_PAGE);
    fs::rename(&from, &to).map_err(|e| StagingError::io(&from, e))?;
    Ok(())
}

/// Rewrite links in every `.html` page below a staged directory
pub fn rewrite_pages(
    staging: &StagingArea,
    staged: &StagedPath,
    bundle: &DependencyBundle,
) -> Result<RewriteSummary, PackageError> {
    let root = glob::Pattern::escape(&staged.as_path().to_string_lossy());
    let mut summary = RewriteSummary::default();

    for page in glob::glob(&format!("{}/**/*.html", root))? {
        let page = page?;
        let source = fs::read(&page).map_err(|e| StagingError::io(&page, e))?;
        let outcome = rewrite_html(&source, bundle)?;

        summary.pages += 1;
        summary.needs_dependency_bundle |= outcome.needs_dependency_bundle;

        if outcome.changed {
            fs::write(&page, &outcome.html).map_err(|e| StagingError::io(&page, e))?;
            summary.rewritten += 1;
        }

        let page_dir = page.parent().unwrap_or(staged.as_path());
        for link in &outcome.rendering_libs {
            summary.patched_libs += patch_local_lib(staging, page_dir, link)?;
        }
    }

    Ok(summary)
}

/// Patch the rendering library a page links to, if it was shipped with the item
fn patch_local_lib(
    staging: &StagingArea,
    page_dir: &Path,
    link: &str,
) -> Result<usize, PackageError> {
    let candidate = page_dir.join(link.trim_start_matches('/'));
    if !candidate.is_file() {
        return Ok(0);
    }

    match staging.guard(&candidate) {
        Ok(staged) => Ok(usize::from(patch_rendering_lib(&staged)?)),
        Err(StagingError::OutsideStaging(path)) => {
            warn!("Not patching rendering library outside staging: {}", path.display());
            Ok(0)
        }
        Err(e) => Err(e.into()),
    }
}
