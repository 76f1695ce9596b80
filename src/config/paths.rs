//! Canonical on-disk layout of the content root and the chef cache.
//!
//! Single source of truth - import this instead of hardcoding paths.
//!
//! ## Content root
//!
//! ```text
//! <content_root>/
//! ├── assets/                   # shared assets (copied into the dependency bundle)
//! │   └── js/
//! │       ├── topics.js         # var topics = [...];
//! │       └── contents.js       # var content = [...];
//! ├── apps/
//! │   ├── PIE/                  # shared libraries (copied into the dependency bundle)
//! │   └── <resource_dir>/       # app-style content
//! └── chapters/
//!     └── <content_id>/         # chapter-style content
//! ```
//!
//! ## Cache
//!
//! | Location | Purpose |
//! |----------|---------|
//! | `zips/<hash>.zip` | content-addressed archives |
//! | `reports/<run_id>.json` | per-run pipeline reports |
//! | `duplicates_library/` | duplicate detector representatives |

use std::path::{Path, PathBuf};

/// Shared assets directory, relative to the content root
pub const ASSETS_DIR: &str = "assets";

/// App-style content directory, relative to the content root
pub const APPS_DIR: &str = "apps";

/// Chapter-style content directory, relative to the content root
pub const CHAPTERS_DIR: &str = "chapters";

/// Shared library subdirectory of the apps area
pub const SHARED_LIB_DIR: &str = "PIE";

/// Canonical entry page name expected by the viewer
pub const ENTRY_PAGE: &str = "index.html";

/// Layout of a content root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLayout {
    root: PathBuf,
}

impl ContentLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/assets`
    pub fn assets_dir(&self) -> PathBuf {
        self.root.join(ASSETS_DIR)
    }

    /// `<root>/assets/js`, home of the record sources
    pub fn js_dir(&self) -> PathBuf {
        self.assets_dir().join("js")
    }

    pub fn topics_file(&self) -> PathBuf {
        self.js_dir().join("topics.js")
    }

    pub fn contents_file(&self) -> PathBuf {
        self.js_dir().join("contents.js")
    }

    /// `<root>/apps`
    pub fn apps_dir(&self) -> PathBuf {
        self.root.join(APPS_DIR)
    }

    /// `<root>/apps/PIE`
    pub fn shared_lib_dir(&self) -> PathBuf {
        self.apps_dir().join(SHARED_LIB_DIR)
    }

    /// `<root>/chapters`
    pub fn chapters_dir(&self) -> PathBuf {
        self.root.join(CHAPTERS_DIR)
    }

    /// Resolve a root-relative path to an absolute one
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}

/// Layout of the chef cache directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Content-addressed archive directory
    pub fn zips_dir(&self) -> PathBuf {
        self.root.join("zips")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    /// Default output for duplicate representatives
    pub fn duplicates_dir(&self) -> PathBuf {
        self.root.join("duplicates_library")
    }
}
