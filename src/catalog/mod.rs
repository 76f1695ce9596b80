//! Catalog tree handed to the publishing side.
//!
//! The resolved forests are turned into a channel: one topic per standard,
//! then the topic hierarchy, with one HTML5 app node per packaged item.
//! Publishing is behind the [`Publisher`] trait; [`ManifestPublisher`]
//! writes the channel out as JSON.

pub mod manifest;
pub mod numeral;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ChannelSettings;
use crate::core::orchestrator::StandardForest;
use crate::domain::{ArchiveRef, DependencyBundle, PackagedItem, TopicNode};

pub use manifest::ManifestPublisher;
pub use numeral::int_to_roman;

/// Root of the published tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub source_domain: String,
    pub source_id: String,
    pub title: String,
    pub language: String,
    pub children: Vec<CatalogTopic>,
}

impl Channel {
    pub fn new(settings: &ChannelSettings) -> Self {
        Self {
            source_domain: settings.source_domain.clone(),
            source_id: settings.source_id.clone(),
            title: settings.title.clone(),
            language: settings.language.clone(),
            children: Vec::new(),
        }
    }

    /// Number of app nodes anywhere in the channel
    pub fn app_count(&self) -> usize {
        self.children.iter().map(CatalogTopic::app_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.app_count() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogTopic {
    pub source_id: String,
    pub title: String,
    pub children: Vec<CatalogNode>,
}

impl CatalogTopic {
    pub fn app_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                CatalogNode::Topic(topic) => topic.app_count(),
                CatalogNode::Html5App(_) => 1,
            })
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogNode {
    Topic(CatalogTopic),
    Html5App(Html5App),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Html5App {
    /// Item directory relative to the content root
    pub source_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub license: String,
    pub copyright_holder: String,
    pub files: Vec<CatalogFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilePreset {
    Html5Zip,
    Html5DependencyZip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFile {
    pub preset: FilePreset,
    pub hash: String,
    pub path: String,
}

impl CatalogFile {
    fn from_archive(preset: FilePreset, archive: &ArchiveRef) -> Self {
        Self {
            preset,
            hash: archive.hash.clone(),
            path: archive.path.to_string_lossy().into_owned(),
        }
    }
}

/// Receives the finished channel
#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, channel: &Channel) -> Result<()>;
}

/// Build the channel from per-standard forests
pub fn build_channel(
    settings: &ChannelSettings,
    bundle: &DependencyBundle,
    standards: &[StandardForest],
) -> Channel {
    let mut channel = Channel::new(settings);

    for standard in standards {
        let children: Vec<CatalogNode> = standard
            .forest
            .iter()
            .filter_map(|root| topic_node(settings, bundle, root))
            .map(CatalogNode::Topic)
            .collect();

        if children.is_empty() {
            continue;
        }
        channel.children.push(CatalogTopic {
            source_id: format!("standard{}", standard.standard),
            title: int_to_roman(standard.standard),
            children,
        });
    }

    channel
}

fn topic_node(
    settings: &ChannelSettings,
    bundle: &DependencyBundle,
    node: &TopicNode,
) -> Option<CatalogTopic> {
    // Apps first, then subtopics
    let mut children: Vec<CatalogNode> = node
        .items
        .iter()
        .map(|item| CatalogNode::Html5App(app_node(settings, bundle, item)))
        .collect();
    children.extend(
        node.children
            .iter()
            .filter_map(|child| topic_node(settings, bundle, child))
            .map(CatalogNode::Topic),
    );

    if children.is_empty() {
        warn!(topic = %node.id, "Topic has no content");
        return None;
    }

    Some(CatalogTopic {
        source_id: node.id.to_string(),
        title: node.label.clone(),
        children,
    })
}

fn app_node(settings: &ChannelSettings, bundle: &DependencyBundle, packaged: &PackagedItem) -> Html5App {
    let item = &packaged.item;
    let mut files = vec![CatalogFile::from_archive(FilePreset::Html5Zip, &packaged.archive)];
    if packaged.needs_dependency_bundle {
        files.push(CatalogFile::from_archive(
            FilePreset::Html5DependencyZip,
            &bundle.archive,
        ));
    }

    Html5App {
        source_id: item.source_id(),
        title: item.title.clone().unwrap_or_else(|| item.source_id()),
        description: item.record.description.clone(),
        author: item.author.clone(),
        license: settings.license.clone(),
        copyright_holder: settings.copyright_holder.clone(),
        files,
    }
}
