//! Command-line interface for the ekShiksha chef.
//!
//! Provides commands for running the full packaging pipeline, previewing
//! which content records resolve, scanning for duplicate files, and showing
//! the resolved configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::catalog::{build_channel, ManifestPublisher, Publisher};
use crate::config::{self, ResolvedConfig};
use crate::core::Orchestrator;
use crate::dupes::DupeFinder;

/// ekshiksha - package ekShiksha content into content-addressed HTML5 bundles
#[derive(Parser, Debug)]
#[command(name = "ekshiksha")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags that take priority over environment and config file
#[derive(Args, Debug, Default)]
pub struct Overrides {
    /// Extracted content root (assets/, apps/, chapters/)
    #[arg(long, global = true)]
    pub content_root: Option<PathBuf>,

    /// Cache directory for archives and reports
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Number of concurrent packaging workers
    #[arg(long, global = true)]
    pub workers: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline and publish the channel manifest
    Run {
        /// Directory for channel.json (defaults to the cache directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List located content items and skipped records without packaging
    Locate,

    /// Group same-named files under the content root by content hash
    Dupes {
        /// File name to look for (case-insensitive)
        filename: String,

        /// Write one representative per group here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write representatives to the default duplicates directory
        #[arg(long, conflicts_with = "output")]
        write: bool,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let cfg = config::config()?.clone().with_overrides(
            self.overrides.content_root,
            self.overrides.cache_dir,
            self.overrides.workers,
        );

        match self.command {
            Commands::Run { output } => run_pipeline(&cfg, output).await,
            Commands::Locate => locate(&cfg).await,
            Commands::Dupes {
                filename,
                output,
                write,
            } => find_dupes(&cfg, filename, output, write).await,
            Commands::Config => show_config(&cfg),
        }
    }
}

/// Run the pipeline end to end
async fn run_pipeline(cfg: &ResolvedConfig, output: Option<PathBuf>) -> Result<()> {
    let orchestrator = Orchestrator::from_config(cfg);
    let run = orchestrator.run().await?;
    let report = &run.report;

    let channel = build_channel(&cfg.channel, &report.dependency_bundle, &run.standards);
    let publisher = ManifestPublisher::new(output.unwrap_or_else(|| cfg.cache_dir.clone()));
    publisher
        .publish(&channel)
        .await
        .with_context(|| format!("Publisher '{}' failed", publisher.name()))?;

    println!("Run ID:            {}", report.run_id);
    println!("Dependency bundle: {}", report.dependency_bundle.archive.file_name());
    println!("Packaged:          {}", report.packaged.len());
    println!("Skipped:           {}", report.skipped.len());
    println!("Failed:            {}", report.failed.len());
    println!("Standards:         {}", run.standards.len());
    println!("Report:            {}", run.report_path.display());
    println!("Manifest:          {}", publisher.manifest_path().display());

    if !report.is_success() {
        eprintln!("\nFailed items:");
        for failed in &report.failed {
            eprintln!("  {}: {}", failed.source_id, failed.error);
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Show what the locator makes of every content record
async fn locate(cfg: &ResolvedConfig) -> Result<()> {
    let orchestrator = Orchestrator::from_config(cfg);
    let located = orchestrator.locate_all().await?;

    println!("Located ({}):", located.items.len());
    for item in &located.items {
        println!(
            "  {:<40} {:<20} standard={}",
            item.source_id(),
            item.html_file,
            item.standard()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    if !located.skipped.is_empty() {
        println!("\nSkipped ({}):", located.skipped.len());
        for skipped in &located.skipped {
            println!("  {:<40} {}", skipped.identity, skipped.reason);
        }
    }

    Ok(())
}

/// Scan for duplicates, optionally writing representatives
async fn find_dupes(
    cfg: &ResolvedConfig,
    filename: String,
    output: Option<PathBuf>,
    write: bool,
) -> Result<()> {
    let finder = DupeFinder::new(&cfg.content_root)?;
    let output = output.or_else(|| write.then(|| cfg.cache_layout().duplicates_dir()));

    let (groups, written) = tokio::task::spawn_blocking(move || -> Result<_> {
        let groups = finder.find_duplicates(&filename)?;
        let written = match &output {
            Some(dir) => Some(finder.output_duplicates(&groups, dir)?),
            None => None,
        };
        Ok((groups, written))
    })
    .await??;

    println!("{} distinct version(s):", groups.len());
    for (hash, paths) in &groups {
        println!("  {} ({} copies)", hash, paths.len());
        for path in paths {
            println!("    {}", path.display());
        }
    }

    if let Some(written) = written {
        println!("\nWrote {} representative file(s)", written.len());
    }

    Ok(())
}

fn show_config(cfg: &ResolvedConfig) -> Result<()> {
    let cache = cfg.cache_layout();

    println!("Config file: {}", cfg.config_file.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "(none - using defaults)".to_string()));
    println!();
    println!("Paths:");
    println!("  Content root: {}", cfg.content_root.display());
    println!("  Cache:        {}", cache.root().display());
    println!("  Archives:     {}", cache.zips_dir().display());
    println!("  Reports:      {}", cache.reports_dir().display());
    println!("  Duplicates:   {}", cache.duplicates_dir().display());
    println!();
    println!("Packaging:");
    println!("  Workers: {}", cfg.workers);
    println!();
    println!("Channel:");
    println!("  Title:            {}", cfg.channel.title);
    println!("  Source id:        {}", cfg.channel.source_id);
    println!("  Source domain:    {}", cfg.channel.source_domain);
    println!("  Language:         {}", cfg.channel.language);
    println!("  License:          {}", cfg.channel.license);
    println!("  Copyright holder: {}", cfg.channel.copyright_holder);

    Ok(())
}
