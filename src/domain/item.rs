//! Resolved content items and the archives produced for them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::records::{ContentRecord, TopicId};
use crate::config::paths::{ASSETS_DIR, SHARED_LIB_DIR};

/// URL prefix under which the viewer serves archive contents
pub const ZIPCONTENT_PREFIX: &str = "/zipcontent/";

/// Which addressing convention located the item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressScheme {
    /// `apps/<resource_dir>`
    App,
    /// `chapters/<content_id>`
    Chapter,
}

/// Validated view of a content record with its asset directory located on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// The record this item was derived from
    pub record: ContentRecord,

    pub scheme: AddressScheme,

    /// Asset directory relative to the content root
    pub dir: PathBuf,

    /// Asset directory as an absolute (root-joined) path
    pub dir_absolute: PathBuf,

    /// Entry file name inside `dir`
    pub html_file: String,

    /// Image directory relative to the content root (chapter-style only)
    pub image_dir: Option<PathBuf>,

    pub title: Option<String>,
    pub author: Option<String>,
    pub organization: Option<String>,
}

impl ContentItem {
    pub fn topic_id(&self) -> Option<TopicId> {
        self.record.topic_id()
    }

    pub fn standard(&self) -> Option<u32> {
        self.record.standard_number()
    }

    /// Stable identity used as the catalog source id and in reports
    pub fn source_id(&self) -> String {
        self.dir.to_string_lossy().replace('\\', "/")
    }

    /// Author or organization is present
    pub fn has_attribution(&self) -> bool {
        self.author.is_some() || self.organization.is_some()
    }
}

/// A content-addressed archive in the cache
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchiveRef {
    /// Hex SHA-256 of the archive bytes
    pub hash: String,

    /// Location in the cache (`<zips_dir>/<hash>.zip`)
    pub path: PathBuf,
}

impl ArchiveRef {
    /// `<hash>.zip`
    pub fn file_name(&self) -> String {
        format!("{}.zip", self.hash)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Identity of the one shared dependency bundle for a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyBundle {
    pub archive: ArchiveRef,
}

impl DependencyBundle {
    pub fn new(archive: ArchiveRef) -> Self {
        Self { archive }
    }

    /// `/zipcontent/<hash>.zip/`
    pub fn base_url(&self) -> String {
        format!("{}{}/", ZIPCONTENT_PREFIX, self.archive.file_name())
    }

    /// Where shared-library links point after rewriting
    pub fn shared_lib_url(&self) -> String {
        format!("{}{}/", self.base_url(), SHARED_LIB_DIR)
    }

    /// Where shared-asset links point after rewriting
    pub fn assets_url(&self) -> String {
        format!("{}{}/", self.base_url(), ASSETS_DIR)
    }
}

/// A content item after packaging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackagedItem {
    pub item: ContentItem,

    /// The item's own archive
    pub archive: ArchiveRef,

    /// Set when any staged page links into the dependency bundle
    pub needs_dependency_bundle: bool,
}
