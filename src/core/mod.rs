//! Core pipeline logic.
//!
//! This module contains:
//! - Locator: content records to on-disk content items
//! - Staging: per-run working directory and the staged-path guard
//! - Rewrite: dependency link rewriting in staged HTML
//! - Archive: deterministic zips and the content-addressed cache
//! - Packager / Bundler: per-item archives and the shared dependency bundle
//! - Resolver: flat topic records to a pruned forest
//! - Orchestrator: one full run

pub mod archive;
pub mod bundler;
pub mod locator;
pub mod orchestrator;
pub mod packager;
pub mod resolver;
pub mod rewrite;
pub mod staging;

// Re-export commonly used types
pub use archive::{ArchiveCache, ArchiveError, CacheInsert};
pub use bundler::{build_dependency_bundle, patch_rendering_lib, BundleError, CROSS_ORIGIN_PATCH};
pub use locator::{ContentLocator, SkipReason};
pub use orchestrator::{
    FailedItem, LocateResult, Orchestrator, PipelineError, PipelineReport, PipelineRun,
    SkippedRecord, StandardForest,
};
pub use packager::{package_item, PackageError};
pub use resolver::{resolve_forest, Resolution, ResolveError};
pub use rewrite::{rewrite_html, RewriteOutcome};
pub use staging::{StagedPath, StagingArea, StagingError};
