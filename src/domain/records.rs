//! Raw records as they appear in the content source files.
//!
//! The source data is loosely typed: ids show up both as numbers and as
//! numeric strings, and the root marker for topics is the string `"#"`.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Parent pointer value that marks a root topic
pub const ROOT_MARKER: &str = "#";

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

/// Topic identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TopicId(pub u64);

impl<'de> Deserialize<'de> for TopicId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(TopicId(n)),
            NumberOrString::String(s) => s
                .trim()
                .parse()
                .map(TopicId)
                .map_err(|_| D::Error::custom(format!("invalid topic id: {:?}", s))),
        }
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parent pointer of a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRef {
    /// `"#"` in the source data
    Root,
    Topic(TopicId),
}

impl<'de> Deserialize<'de> for ParentRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(ParentRef::Topic(TopicId(n))),
            NumberOrString::String(s) if s.trim() == ROOT_MARKER => Ok(ParentRef::Root),
            NumberOrString::String(s) => s
                .trim()
                .parse()
                .map(|n| ParentRef::Topic(TopicId(n)))
                .map_err(|_| D::Error::custom(format!("invalid parent id: {:?}", s))),
        }
    }
}

impl Serialize for ParentRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParentRef::Root => serializer.serialize_str(ROOT_MARKER),
            ParentRef::Topic(id) => id.serialize(serializer),
        }
    }
}

/// A key that may be written as a number or a string (content ids, standards)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordKey(pub String);

impl<'de> Deserialize<'de> for RecordKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => RecordKey(n.to_string()),
            NumberOrString::String(s) => RecordKey(s),
        })
    }
}

impl RecordKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One node of the curriculum hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRecord {
    pub id: TopicId,

    /// Display label
    #[serde(rename = "text", default)]
    pub label: String,

    /// Missing parent means the topic is neither a root nor anyone's child
    #[serde(default)]
    pub parent: Option<ParentRef>,
}

/// `{ "unicodeText": ... }` title wrapper
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordTitle {
    #[serde(default)]
    pub unicode_text: Option<String>,
}

/// `{ "id": ... }` topic assignment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopicAssignment {
    pub id: TopicId,
}

/// Raw metadata entry for one piece of content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    /// Nominal entry file; may also name unsupported formats (.jsp, .swf)
    #[serde(default)]
    pub html_file_name: String,

    /// App-style addressing
    #[serde(default)]
    pub resource_dir: Option<String>,

    /// Chapter-style addressing
    #[serde(default)]
    pub content_id: Option<RecordKey>,

    #[serde(default)]
    pub resource_url: Option<String>,

    #[serde(default)]
    pub image_dir: Option<String>,

    #[serde(default)]
    pub developer_name: Option<String>,

    #[serde(default)]
    pub organization: Option<String>,

    #[serde(default)]
    pub title: Option<RecordTitle>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub topic: Option<TopicAssignment>,

    /// CBSE standard (grade) the content is aligned to
    #[serde(default)]
    pub standard: Option<RecordKey>,
}

impl ContentRecord {
    /// Topic this record is assigned to, if any
    pub fn topic_id(&self) -> Option<TopicId> {
        self.topic.map(|t| t.id)
    }

    /// Numeric standard, if present and well-formed
    pub fn standard_number(&self) -> Option<u32> {
        self.standard.as_ref()?.as_str().trim().parse().ok()
    }

    /// A short identity for diagnostics
    pub fn identity(&self) -> String {
        if let Some(dir) = non_empty(self.resource_dir.as_deref()) {
            format!("app:{}", dir)
        } else if let Some(id) = &self.content_id {
            format!("chapter:{}", id)
        } else {
            format!("file:{}", self.html_file_name)
        }
    }
}

/// Treat empty strings in the source data as absent
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
