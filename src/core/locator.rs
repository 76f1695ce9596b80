//! Content locator: maps content records onto asset directories.
//!
//! Two addressing conventions exist in the source data:
//! - app-style records carry `resourceDir` and live under `apps/<resource_dir>`
//! - chapter-style records carry `contentId` + `resourceUrl` and live under
//!   `chapters/<content_id>`, with the entry page `<resource_url>.html`

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::config::paths::{ContentLayout, APPS_DIR, CHAPTERS_DIR};
use crate::domain::records::non_empty;
use crate::domain::{AddressScheme, ContentItem, ContentRecord};

/// The only entry-file extension the viewer supports
pub const HTML_EXTENSION: &str = "html";

/// Why a record did not produce a content item
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("unsupported entry format: {file}")]
    UnsupportedFormat { file: String },

    #[error("record carries neither resourceDir nor contentId")]
    NoAddress,

    #[error("chapter record has no resourceUrl")]
    MissingResourceUrl,

    #[error("address escapes the content root: {0}")]
    InvalidPath(String),

    #[error("asset directory not shipped: {}", .0.display())]
    MissingAssetDir(PathBuf),
}

/// Resolves records against one content root
#[derive(Debug, Clone)]
pub struct ContentLocator {
    layout: ContentLayout,
}

impl ContentLocator {
    pub fn new(layout: ContentLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ContentLayout {
        &self.layout
    }

    /// Locate a record, dropping it silently when unresolvable
    pub fn locate(&self, record: &ContentRecord) -> Option<ContentItem> {
        self.classify(record).ok()
    }

    /// Locate a record, reporting why it was dropped
    pub fn classify(&self, record: &ContentRecord) -> Result<ContentItem, SkipReason> {
        let entry = Path::new(&record.html_file_name);
        if entry.extension().and_then(|e| e.to_str()) != Some(HTML_EXTENSION) {
            return Err(SkipReason::UnsupportedFormat {
                file: record.html_file_name.clone(),
            });
        }

        let mut item = if let Some(resource_dir) = non_empty(record.resource_dir.as_deref()) {
            self.locate_app(record, resource_dir)?
        } else if let Some(content_id) = &record.content_id {
            self.locate_chapter(record, content_id.as_str())?
        } else {
            return Err(SkipReason::NoAddress);
        };

        item.author = non_empty(record.developer_name.as_deref()).map(str::to_string);
        item.organization = non_empty(record.organization.as_deref()).map(str::to_string);
        item.title = record
            .title
            .as_ref()
            .and_then(|t| non_empty(t.unicode_text.as_deref()))
            .map(str::to_string);

        Ok(item)
    }

    fn locate_app(
        &self,
        record: &ContentRecord,
        resource_dir: &str,
    ) -> Result<ContentItem, SkipReason> {
        let dir = relative_dir(APPS_DIR, resource_dir)?;
        let dir_absolute = self.existing_dir(&dir)?;

        // Entry file name is taken as stated, without any leading directories
        let html_file = Path::new(&record.html_file_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| record.html_file_name.clone());

        Ok(ContentItem {
            record: record.clone(),
            scheme: AddressScheme::App,
            dir,
            dir_absolute,
            html_file,
            image_dir: None,
            title: None,
            author: None,
            organization: None,
        })
    }

    fn locate_chapter(
        &self,
        record: &ContentRecord,
        content_id: &str,
    ) -> Result<ContentItem, SkipReason> {
        let dir = relative_dir(CHAPTERS_DIR, content_id)?;
        let dir_absolute = self.existing_dir(&dir)?;

        let resource_url =
            non_empty(record.resource_url.as_deref()).ok_or(SkipReason::MissingResourceUrl)?;

        let image_dir = non_empty(record.image_dir.as_deref()).map(|d| dir.join(d));

        Ok(ContentItem {
            record: record.clone(),
            scheme: AddressScheme::Chapter,
            dir,
            dir_absolute,
            html_file: format!("{}.{}", resource_url, HTML_EXTENSION),
            image_dir,
            title: None,
            author: None,
            organization: None,
        })
    }

    fn existing_dir(&self, dir: &Path) -> Result<PathBuf, SkipReason> {
        let absolute = self.layout.resolve(dir);
        if absolute.is_dir() {
            Ok(absolute)
        } else {
            Err(SkipReason::MissingAssetDir(dir.to_path_buf()))
        }
    }
}

/// `<area>/<name>`, rejecting names that would leave the area
fn relative_dir(area: &str, name: &str) -> Result<PathBuf, SkipReason> {
    let name_path = Path::new(name.trim());
    if !name_path
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(SkipReason::InvalidPath(name.to_string()));
    }
    Ok(Path::new(area).join(name_path))
}
