//! Configuration for the chef.
//!
//! Configuration sources (highest priority first):
//! 1. CLI flags (applied by the caller through [`ResolvedConfig::with_overrides`])
//! 2. Environment variables (EKSHIKSHA_CONTENT_ROOT, EKSHIKSHA_CACHE_DIR)
//! 3. Config file (.ekshiksha/config.yaml)
//! 4. Defaults (./files/ekShiksha/ekShikshaEnglish, ./chefdata/sushi-chef-ekShiksha)
//!
//! Config file discovery:
//! - Searches current directory and parents for .ekshiksha/config.yaml
//! - Falls back to ~/.ekshiksha/config.yaml
//! - Paths in config file are relative to the directory containing .ekshiksha/

pub mod paths;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use self::paths::{CacheLayout, ContentLayout};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const DEFAULT_CONTENT_ROOT: &str = "files/ekShiksha/ekShikshaEnglish";
const DEFAULT_CACHE_DIR: &str = "chefdata/sushi-chef-ekShiksha";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub packaging: Option<PackagingConfig>,
    #[serde(default)]
    pub channel: Option<ChannelConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Extracted content root (relative to the config file's project root)
    pub content_root: Option<String>,
    /// Cache directory for archives and reports
    pub cache_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackagingConfig {
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    pub title: Option<String>,
    pub source_id: Option<String>,
    pub source_domain: Option<String>,
    pub language: Option<String>,
    pub license: Option<String>,
    pub copyright_holder: Option<String>,
}

/// Channel metadata handed to the catalog publisher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub title: String,
    pub source_id: String,
    pub source_domain: String,
    pub language: String,
    pub license: String,
    pub copyright_holder: String,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            title: "ekShiksha".to_string(),
            source_id: "sushi-chef-ekShiksha".to_string(),
            source_domain: "ekshiksha".to_string(),
            language: "en".to_string(),
            license: "CC BY-NC".to_string(),
            copyright_holder: "ekShiksha".to_string(),
        }
    }
}

impl ChannelSettings {
    fn merged(config: Option<&ChannelConfig>) -> Self {
        let defaults = Self::default();
        let Some(config) = config else {
            return defaults;
        };

        Self {
            title: config.title.clone().unwrap_or(defaults.title),
            source_id: config.source_id.clone().unwrap_or(defaults.source_id),
            source_domain: config
                .source_domain
                .clone()
                .unwrap_or(defaults.source_domain),
            language: config.language.clone().unwrap_or(defaults.language),
            license: config.license.clone().unwrap_or(defaults.license),
            copyright_holder: config
                .copyright_holder
                .clone()
                .unwrap_or(defaults.copyright_holder),
        }
    }
}

/// Resolved configuration with concrete paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Extracted content root
    pub content_root: PathBuf,
    /// Cache directory (archives, reports, duplicate output)
    pub cache_dir: PathBuf,
    /// Number of concurrent packaging workers
    pub workers: usize,
    /// Channel metadata
    pub channel: ChannelSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    pub fn content_layout(&self) -> ContentLayout {
        ContentLayout::new(&self.content_root)
    }

    pub fn cache_layout(&self) -> CacheLayout {
        CacheLayout::new(&self.cache_dir)
    }

    /// Apply CLI overrides on top of the resolved values
    pub fn with_overrides(
        mut self,
        content_root: Option<PathBuf>,
        cache_dir: Option<PathBuf>,
        workers: Option<usize>,
    ) -> Self {
        if let Some(root) = content_root {
            self.content_root = root;
        }
        if let Some(cache) = cache_dir {
            self.cache_dir = cache;
        }
        if let Some(workers) = workers {
            self.workers = workers.max(1);
        }
        self
    }
}

/// Values read from the environment
#[derive(Debug, Clone, Default)]
struct EnvOverrides {
    content_root: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            content_root: std::env::var("EKSHIKSHA_CONTENT_ROOT")
                .ok()
                .map(PathBuf::from),
            cache_dir: std::env::var("EKSHIKSHA_CACHE_DIR").ok().map(PathBuf::from),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Find config file by searching a directory and its parents, then the home directory
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".ekshiksha").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    let home_config = dirs::home_dir()?.join(".ekshiksha").join("config.yaml");
    home_config.exists().then_some(home_config)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Combine config file, environment and defaults
fn build_config(config_file: Option<PathBuf>, env: EnvOverrides) -> Result<ResolvedConfig> {
    let parsed = config_file
        .as_deref()
        .map(load_config_file)
        .transpose()?;

    // Base directory is the parent of .ekshiksha/ (i.e., grandparent of config.yaml)
    let base_dir = config_file
        .as_deref()
        .and_then(|p| p.parent())
        .and_then(|p| p.parent())
        .unwrap_or(Path::new("."));

    let content_root = env.content_root.unwrap_or_else(|| {
        parsed
            .as_ref()
            .and_then(|c| c.paths.content_root.as_deref())
            .map(|p| resolve_path(base_dir, p))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTENT_ROOT))
    });

    let cache_dir = env.cache_dir.unwrap_or_else(|| {
        parsed
            .as_ref()
            .and_then(|c| c.paths.cache_dir.as_deref())
            .map(|p| resolve_path(base_dir, p))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR))
    });

    let workers = parsed
        .as_ref()
        .and_then(|c| c.packaging.as_ref())
        .and_then(|p| p.workers)
        .unwrap_or_else(default_workers)
        .max(1);

    let channel = ChannelSettings::merged(parsed.as_ref().and_then(|c| c.channel.as_ref()));

    Ok(ResolvedConfig {
        content_root,
        cache_dir,
        workers,
        channel,
        config_file,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    build_config(find_config_file(&cwd), EnvOverrides::from_env())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(temp: &TempDir, body: &str) -> PathBuf {
        let dir = temp.path().join(".ekshiksha");
        std::fs::create_dir_all(&dir).unwrap();
        let config_path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "{}", body).unwrap();
        config_path
    }

    #[test]
    fn test_defaults_without_file() {
        let config = build_config(None, EnvOverrides::default()).unwrap();

        assert_eq!(config.content_root, PathBuf::from(DEFAULT_CONTENT_ROOT));
        assert_eq!(config.cache_dir, PathBuf::from(DEFAULT_CACHE_DIR));
        assert!(config.workers >= 1);
        assert_eq!(config.channel, ChannelSettings::default());
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            &temp,
            r#"
version: "1.0"
paths:
  content_root: content/english
  cache_dir: /var/cache/ekshiksha
packaging:
  workers: 3
channel:
  title: ekShiksha Test
"#,
        );

        let config = build_config(Some(config_path.clone()), EnvOverrides::default()).unwrap();
        assert_eq!(config.content_root, temp.path().join("content/english"));
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/ekshiksha"));
        assert_eq!(config.workers, 3);
        assert_eq!(config.channel.title, "ekShiksha Test");
        assert_eq!(config.channel.language, "en");
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_env_overrides_config_file() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            &temp,
            r#"
version: "1.0"
paths:
  content_root: content/english
"#,
        );

        let env = EnvOverrides {
            content_root: Some(PathBuf::from("/env/content")),
            cache_dir: None,
        };
        let config = build_config(Some(config_path), env).unwrap();
        assert_eq!(config.content_root, PathBuf::from("/env/content"));
        assert_eq!(config.cache_dir, PathBuf::from(DEFAULT_CACHE_DIR));
    }

    #[test]
    fn test_find_config_file_in_parent() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(&temp, "version: \"1.0\"");
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config_file(&nested), Some(config_path));
    }

    #[test]
    fn test_cli_overrides() {
        let config = build_config(None, EnvOverrides::default())
            .unwrap()
            .with_overrides(Some(PathBuf::from("/cli/root")), None, Some(0));

        assert_eq!(config.content_root, PathBuf::from("/cli/root"));
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "files/content"),
            PathBuf::from("/home/user/project/files/content")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
