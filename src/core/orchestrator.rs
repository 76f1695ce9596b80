//! Run orchestration.
//!
//! Dependency bundle first, then locate + package every content record on a
//! bounded pool of blocking workers, then resolve one topic forest per
//! standard. Per-item failures, panics included, are collected into the run
//! report; a missing content root or a failed dependency bundle aborts the run.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{AcquireError, Semaphore};
use tokio::task::{self, JoinError, JoinSet};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::archive::{ArchiveCache, ArchiveError};
use super::bundler::{build_dependency_bundle, BundleError};
use super::locator::ContentLocator;
use super::packager::package_item;
use super::resolver::{resolve_forest, ResolveError};
use super::staging::{StagingArea, StagingError};
use crate::config::paths::{CacheLayout, ContentLayout};
use crate::config::ResolvedConfig;
use crate::domain::{ContentItem, ContentRecord, DependencyBundle, PackagedItem, TopicNode};
use crate::source::{self, RecordError};

/// Run-aborting failures
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Content root does not exist: {}", .0.display())]
    ContentRootMissing(PathBuf),

    #[error("Failed to build dependency bundle: {0}")]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Records(#[from] RecordError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Worker task failed: {0}")]
    Worker(#[from] JoinError),

    #[error("Worker pool closed: {0}")]
    Pool(#[from] AcquireError),

    #[error("Failed to write report {}: {source}", .path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A record that never became a packaged item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub identity: String,
    pub reason: String,
}

/// An item whose packaging failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub source_id: String,
    pub error: String,
}

/// Persisted summary of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub dependency_bundle: DependencyBundle,
    pub packaged: Vec<PackagedItem>,
    pub skipped: Vec<SkippedRecord>,
    pub failed: Vec<FailedItem>,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Resolved forest for one standard
#[derive(Debug, Clone)]
pub struct StandardForest {
    pub standard: u32,
    pub forest: Vec<TopicNode>,
}

/// Everything a finished run hands to the publisher
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub report: PipelineReport,
    pub report_path: PathBuf,
    /// Ascending by standard
    pub standards: Vec<StandardForest>,
}

/// Located items plus the records that were dropped
#[derive(Debug, Clone, Default)]
pub struct LocateResult {
    pub items: Vec<ContentItem>,
    pub skipped: Vec<SkippedRecord>,
}

/// Drives one pipeline run
#[derive(Debug, Clone)]
pub struct Orchestrator {
    content: ContentLayout,
    cache: CacheLayout,
    workers: usize,
}

impl Orchestrator {
    pub fn new(content: ContentLayout, cache: CacheLayout, workers: usize) -> Self {
        Self {
            content,
            cache,
            workers: workers.max(1),
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(config.content_layout(), config.cache_layout(), config.workers)
    }

    pub fn content(&self) -> &ContentLayout {
        &self.content
    }

    pub fn cache(&self) -> &CacheLayout {
        &self.cache
    }

    fn ensure_content_root(&self) -> Result<(), PipelineError> {
        if !self.content.root().is_dir() {
            return Err(PipelineError::ContentRootMissing(
                self.content.root().to_path_buf(),
            ));
        }
        Ok(())
    }

    /// Load content records and run the locator over them
    pub async fn locate_all(&self) -> Result<LocateResult, PipelineError> {
        self.ensure_content_root()?;
        let records = source::load_contents(&self.content).await?;
        Ok(locate_records(&ContentLocator::new(self.content.clone()), &records))
    }

    /// Execute a full run
    #[instrument(skip(self), fields(root = %self.content.root().display(), workers = self.workers))]
    pub async fn run(&self) -> Result<PipelineRun, PipelineError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, "Starting pipeline run");

        self.ensure_content_root()?;

        let staging = Arc::new(StagingArea::new()?);
        let archives = ArchiveCache::open(self.cache.zips_dir())?;

        let bundle = {
            let layout = self.content.clone();
            let staging = Arc::clone(&staging);
            let archives = archives.clone();
            task::spawn_blocking(move || build_dependency_bundle(&layout, &staging, &archives))
                .await??
        };

        let topics = source::load_topics(&self.content).await?;
        let located = self.locate_all().await?;
        let mut skipped = located.skipped;

        let (packaged, failed) = self
            .package_all(located.items, Arc::new(bundle.clone()), staging, archives)
            .await?;

        // Group by standard, ascending
        let mut by_standard: BTreeMap<u32, Vec<PackagedItem>> = BTreeMap::new();
        for item in &packaged {
            match item.item.standard() {
                Some(standard) => by_standard.entry(standard).or_default().push(item.clone()),
                None => {
                    warn!(item = %item.item.source_id(), "Missing or non-numeric standard");
                    skipped.push(SkippedRecord {
                        identity: item.item.source_id(),
                        reason: "missing or non-numeric standard".to_string(),
                    });
                }
            }
        }

        let mut standards = Vec::with_capacity(by_standard.len());
        for (standard, items) in by_standard {
            let resolution = resolve_forest(&topics, items)?;

            for dropped in &resolution.unassigned {
                skipped.push(SkippedRecord {
                    identity: dropped.item.source_id(),
                    reason: "topic assignment not found".to_string(),
                });
            }
            for dropped in &resolution.unreachable {
                skipped.push(SkippedRecord {
                    identity: dropped.item.source_id(),
                    reason: "topic not reachable from any root".to_string(),
                });
            }

            if resolution.forest.is_empty() {
                warn!(standard, "No content left in standard after resolution");
                continue;
            }
            info!(standard, items = resolution.item_count(), "Resolved standard");
            standards.push(StandardForest {
                standard,
                forest: resolution.forest,
            });
        }

        let report = PipelineReport {
            run_id,
            started_at,
            completed_at: Some(Utc::now()),
            dependency_bundle: bundle,
            packaged,
            skipped,
            failed,
        };
        let report_path = save_report(&report, &self.cache.reports_dir()).await?;

        info!(
            %run_id,
            packaged = report.packaged.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Pipeline run finished"
        );

        Ok(PipelineRun {
            report,
            report_path,
            standards,
        })
    }

    /// Package items concurrently; results keep input order
    async fn package_all(
        &self,
        items: Vec<ContentItem>,
        bundle: Arc<DependencyBundle>,
        staging: Arc<StagingArea>,
        archives: ArchiveCache,
    ) -> Result<(Vec<PackagedItem>, Vec<FailedItem>), PipelineError> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();
        let mut sources = HashMap::new();

        for (position, item) in items.into_iter().enumerate() {
            let permit = Arc::clone(&semaphore).acquire_owned().await?;
            let bundle = Arc::clone(&bundle);
            let staging = Arc::clone(&staging);
            let archives = archives.clone();
            let source_id = item.source_id();

            let handle = tasks.spawn_blocking(move || {
                let _permit = permit;
                package_item(item, &bundle, &staging, &archives)
            });
            sources.insert(handle.id(), (position, source_id));
        }

        collect_outcomes(tasks, sources).await
    }
}

/// Drain per-item tasks into successes and failures, both in input order.
///
/// `sources` maps each task to its input position and source id. A task that
/// panics is recorded as a failed item; only cancellation aborts.
async fn collect_outcomes<T, E>(
    mut tasks: JoinSet<Result<T, E>>,
    mut sources: HashMap<task::Id, (usize, String)>,
) -> Result<(Vec<T>, Vec<FailedItem>), PipelineError>
where
    T: 'static,
    E: std::fmt::Display + 'static,
{
    let mut done = Vec::new();
    let mut failed = Vec::new();

    while let Some(joined) = tasks.join_next_with_id().await {
        let (id, outcome) = match joined {
            Ok((id, result)) => (id, result.map_err(|e| e.to_string())),
            Err(e) if e.is_panic() => {
                let id = e.id();
                (id, Err(format!("packaging task panicked: {}", panic_message(e))))
            }
            Err(e) => return Err(e.into()),
        };
        let Some((position, source_id)) = sources.remove(&id) else {
            continue;
        };

        match outcome {
            Ok(packaged) => done.push((position, packaged)),
            Err(message) => {
                error!(item = %source_id, error = %message, "Packaging failed");
                failed.push((
                    position,
                    FailedItem {
                        source_id,
                        error: message,
                    },
                ));
            }
        }
    }

    done.sort_by_key(|(position, _)| *position);
    failed.sort_by_key(|(position, _)| *position);
    Ok((
        done.into_iter().map(|(_, p)| p).collect(),
        failed.into_iter().map(|(_, f)| f).collect(),
    ))
}

fn panic_message(err: JoinError) -> String {
    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run the locator over every record, collecting drops with their reason
pub fn locate_records(locator: &ContentLocator, records: &[ContentRecord]) -> LocateResult {
    let mut result = LocateResult::default();

    for record in records {
        match locator.classify(record) {
            Ok(item) => {
                if !item.has_attribution() {
                    warn!(item = %item.source_id(), "Item has neither author nor organization");
                }
                result.items.push(item);
            }
            Err(reason) => {
                warn!(record = %record.identity(), %reason, "Skipping content record");
                result.skipped.push(SkippedRecord {
                    identity: record.identity(),
                    reason: reason.to_string(),
                });
            }
        }
    }

    result
}

/// Write a report as `<reports_dir>/<run_id>.json`
pub async fn save_report(report: &PipelineReport, reports_dir: &Path) -> Result<PathBuf, PipelineError> {
    tokio::fs::create_dir_all(reports_dir)
        .await
        .map_err(|source| PipelineError::Report {
            path: reports_dir.to_path_buf(),
            source,
        })?;

    let path = reports_dir.join(format!("{}.json", report.run_id));
    let json = serde_json::to_vec_pretty(report)?;
    tokio::fs::write(&path, json)
        .await
        .map_err(|source| PipelineError::Report {
            path: path.clone(),
            source,
        })?;

    Ok(path)
}
