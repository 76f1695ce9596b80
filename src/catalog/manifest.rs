//! Publisher that writes the channel as a JSON manifest.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::info;

use super::{Channel, Publisher};

/// Manifest file name inside the output directory
pub const MANIFEST_FILE: &str = "channel.json";

/// Writes `channel.json` into an output directory
#[derive(Debug, Clone)]
pub struct ManifestPublisher {
    output_dir: PathBuf,
}

impl ManifestPublisher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir.join(MANIFEST_FILE)
    }
}

#[async_trait]
impl Publisher for ManifestPublisher {
    fn name(&self) -> &str {
        "manifest"
    }

    async fn publish(&self, channel: &Channel) -> Result<()> {
        if channel.is_empty() {
            anyhow::bail!("Refusing to publish channel '{}': it has no content", channel.title);
        }

        fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.output_dir.display()))?;

        let path = self.manifest_path();
        let content = serde_json::to_string_pretty(channel)?;
        fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write manifest: {}", path.display()))?;

        info!(apps = channel.app_count(), "Wrote {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogFile, CatalogNode, CatalogTopic, FilePreset, Html5App};
    use crate::config::ChannelSettings;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_rejects_empty_channel() {
        let out = TempDir::new().unwrap();
        let publisher = ManifestPublisher::new(out.path());

        let channel = Channel::new(&ChannelSettings::default());
        assert!(publisher.publish(&channel).await.is_err());
        assert!(!publisher.manifest_path().exists());
    }

    #[tokio::test]
    async fn test_writes_manifest() {
        let out = TempDir::new().unwrap();
        let publisher = ManifestPublisher::new(out.path().join("nested"));

        let mut channel = Channel::new(&ChannelSettings::default());
        channel.children.push(CatalogTopic {
            source_id: "standard6".to_string(),
            title: "VI".to_string(),
            children: vec![CatalogNode::Html5App(Html5App {
                source_id: "apps/lens".to_string(),
                title: "Lens".to_string(),
                description: None,
                author: None,
                license: "CC BY-NC".to_string(),
                copyright_holder: "ekShiksha".to_string(),
                files: vec![CatalogFile {
                    preset: FilePreset::Html5Zip,
                    hash: "abc".to_string(),
                    path: "abc.zip".to_string(),
                }],
            })],
        });

        publisher.publish(&channel).await.unwrap();

        let written = std::fs::read_to_string(publisher.manifest_path()).unwrap();
        let parsed: Channel = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, channel);
        assert!(written.contains("\"kind\": \"html5_app\""));
    }
}
