//! Record sources: the `topics.js` and `contents.js` files of a content root.

pub mod js_literal;

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::fs;

use crate::config::paths::ContentLayout;
use crate::domain::{ContentRecord, TopicRecord};

pub use js_literal::parse_js_literal;

/// Errors raised while reading record sources
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Source is not a `name = value` assignment")]
    NotAnAssignment,

    #[error("Assignment has no variable name")]
    MissingName,

    #[error("Invalid JSON literal for `{name}`: {source}")]
    InvalidJson {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Expected variable `{expected}` in {path}, found `{found}`")]
    MissingKey {
        expected: String,
        found: String,
        path: PathBuf,
    },

    #[error("Malformed `{name}` records in {path}: {source}")]
    Malformed {
        name: String,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read a JS literal file and deserialize the named variable
pub async fn load_named<T: DeserializeOwned>(path: &Path, name: &str) -> Result<T, RecordError> {
    let text = fs::read_to_string(path)
        .await
        .map_err(|source| RecordError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let mut parsed = parse_js_literal(&text)?;
    let value = parsed.remove(name).ok_or_else(|| RecordError::MissingKey {
        expected: name.to_string(),
        found: parsed.keys().cloned().collect::<Vec<_>>().join(", "),
        path: path.to_path_buf(),
    })?;

    serde_json::from_value(value).map_err(|source| RecordError::Malformed {
        name: name.to_string(),
        path: path.to_path_buf(),
        source,
    })
}

/// Load the `topics` list
pub async fn load_topics(layout: &ContentLayout) -> Result<Vec<TopicRecord>, RecordError> {
    load_named(&layout.topics_file(), "topics").await
}

/// Load the `content` list
pub async fn load_contents(layout: &ContentLayout) -> Result<Vec<ContentRecord>, RecordError> {
    load_named(&layout.contents_file(), "content").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParentRef, TopicId};
    use tempfile::TempDir;

    async fn layout_with_sources(topics: &str, contents: &str) -> (ContentLayout, TempDir) {
        let temp = TempDir::new().unwrap();
        let layout = ContentLayout::new(temp.path());
        fs::create_dir_all(layout.js_dir()).await.unwrap();
        fs::write(layout.topics_file(), topics).await.unwrap();
        fs::write(layout.contents_file(), contents).await.unwrap();
        (layout, temp)
    }

    #[tokio::test]
    async fn test_load_topics_and_contents() {
        let (layout, _temp) = layout_with_sources(
            r##"var topics = [{"id": 1, "text": "Maths", "parent": "#"}, {"id": 2, "text": "Algebra", "parent": "1"}];"##,
            r#"var content = [{"htmlFileName": "index.html", "resourceDir": "algebra1", "topic": {"id": 2}, "standard": 7}];"#,
        )
        .await;

        let topics = load_topics(&layout).await.unwrap();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[1].parent, Some(ParentRef::Topic(TopicId(1))));

        let contents = load_contents(&layout).await.unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].resource_dir.as_deref(), Some("algebra1"));
        assert_eq!(contents[0].standard_number(), Some(7));
    }

    #[tokio::test]
    async fn test_wrong_variable_name() {
        let (layout, _temp) = layout_with_sources("var subjects = [];", "var content = [];").await;

        let err = load_topics(&layout).await.unwrap_err();
        match err {
            RecordError::MissingKey { expected, found, .. } => {
                assert_eq!(expected, "topics");
                assert_eq!(found, "subjects");
            }
            other => panic!("Expected MissingKey, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let layout = ContentLayout::new(temp.path());
        assert!(matches!(
            load_contents(&layout).await,
            Err(RecordError::Io { .. })
        ));
    }
}
