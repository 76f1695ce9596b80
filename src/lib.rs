//! ekshiksha - content assembly pipeline for ekShiksha HTML5 content
//!
//! Turns an extracted ekShiksha content archive (flat topic and content
//! records, shared libraries, per-app and per-chapter asset trees) into a
//! hierarchy of self-contained, content-addressed zip bundles.
//!
//! # Pipeline
//!
//! - The shared assets and libraries are bundled once into a dependency bundle
//! - Each content record is located on disk under one of two addressing schemes
//! - Each located item is staged, link-rewritten and archived deterministically;
//!   archives are cached by the SHA-256 of their bytes
//! - Packaged items are resolved into one pruned topic forest per standard
//! - The forests are handed to a [`catalog::Publisher`]
//!
//! # Modules
//!
//! - `config`: Layered configuration and on-disk layout
//! - `domain`: Records, content items, archives, topic nodes
//! - `source`: Parsing of the `var name = {...};` record files
//! - `core`: Locator, staging, rewriting, archiving, bundling, resolving, orchestration
//! - `dupes`: Duplicate file detection
//! - `catalog`: Channel tree and publishers
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Package everything and write channel.json
//! ekshiksha run --content-root files/ekShiksha/ekShikshaEnglish
//!
//! # See which records resolve to content on disk
//! ekshiksha locate
//!
//! # How many distinct copies of the rendering library ship?
//! ekshiksha dupes Three.js --write
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod dupes;
pub mod source;

// Re-export main types at crate root for convenience
pub use catalog::{build_channel, Channel, ManifestPublisher, Publisher};
pub use core::{Orchestrator, PipelineError, PipelineReport, PipelineRun};
pub use domain::{ContentItem, ContentRecord, DependencyBundle, PackagedItem, TopicNode, TopicRecord};
pub use dupes::{DupeFinder, DuplicateError};
