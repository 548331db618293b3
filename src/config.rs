//! Configuration for watched folders, dispatch and loading.
//!
//! Loaded from TOML:
//!
//! ```toml
//! base_dir = "/srv/import"
//! file_filter = "*.csv"
//! workers = 4
//! database_path = "import.sqlite3"
//!
//! [load]
//! batch_size = 500
//!
//! [[targets]]
//! root = "office"
//! category = "office"
//!
//! [[targets]]
//! root = "person"
//! category = "person"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IngestionError, IngestionResult};
use crate::loader::RetryPolicy;
use crate::watch::{CategoryResolution, FileFilter};

/// Logical import kind assigned to a watched root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// A watched directory and the category its files belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchTarget {
    pub root: PathBuf,
    pub category: Category,
}

impl WatchTarget {
    pub fn new(root: impl Into<PathBuf>, category: impl Into<Category>) -> Self {
        Self {
            root: root.into(),
            category: category.into(),
        }
    }
}

/// Options for [`crate::loader::BatchLoader`] callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Records per transactional chunk.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_batch_size() -> usize {
    30
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Directory that relative target roots are resolved against.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    /// Watched roots, one monitor each. Their order has no effect on dispatch; legacy
    /// substring resolution follows handler binding order.
    #[serde(default)]
    pub targets: Vec<WatchTarget>,

    /// Glob matched against created file names.
    #[serde(default = "default_file_filter")]
    pub file_filter: String,

    /// Worker threads used to run category handlers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Forward files already present under the roots at startup.
    #[serde(default)]
    pub scan_existing: bool,

    #[serde(default)]
    pub resolution: CategoryResolution,

    /// SQLite database file handlers load into.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub load: LoadOptions,
}

fn default_file_filter() -> String {
    "*.csv".to_string()
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            targets: Vec::new(),
            file_filter: default_file_filter(),
            workers: default_workers(),
            scan_existing: false,
            resolution: CategoryResolution::default(),
            database_path: None,
            load: LoadOptions::default(),
        }
    }
}

impl IngestConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> IngestionResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> IngestionResult<Self> {
        let config: IngestConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> IngestionResult<()> {
        if self.targets.is_empty() {
            return Err(config_error("at least one watch target is required"));
        }
        if let Some(t) = self.targets.iter().find(|t| t.category.as_str().is_empty()) {
            return Err(config_error(format!(
                "watch target '{}' has an empty category",
                t.root.display()
            )));
        }
        if self.workers == 0 {
            return Err(config_error("workers must be > 0"));
        }
        if self.load.batch_size == 0 {
            return Err(config_error("load.batch_size must be > 0"));
        }
        if self.load.retry.max_attempts == 0 {
            return Err(config_error("load.retry.max_attempts must be > 0"));
        }
        self.file_filter()?;
        Ok(())
    }

    /// Targets with relative roots joined onto [`IngestConfig::base_dir`].
    pub fn resolved_targets(&self) -> Vec<WatchTarget> {
        self.targets
            .iter()
            .map(|t| match &self.base_dir {
                Some(base) if t.root.is_relative() => WatchTarget {
                    root: base.join(&t.root),
                    category: t.category.clone(),
                },
                _ => t.clone(),
            })
            .collect()
    }

    pub fn file_filter(&self) -> IngestionResult<FileFilter> {
        FileFilter::new(&self.file_filter)
    }
}

fn config_error(message: impl Into<String>) -> IngestionError {
    IngestionError::Config {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{IngestConfig, WatchTarget};
    use crate::watch::CategoryResolution;

    const SAMPLE: &str = r#"
base_dir = "/srv/import"
workers = 2
resolution = "path_substring"

[load]
batch_size = 100
[load.retry]
max_attempts = 5
retry_on_failure = true

[[targets]]
root = "office"
category = "office"

[[targets]]
root = "/mnt/results"
category = "result"
"#;

    #[test]
    fn parses_full_config() {
        let cfg = IngestConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.workers, 2);
        assert_eq!(cfg.file_filter, "*.csv");
        assert_eq!(cfg.resolution, CategoryResolution::PathSubstring);
        assert_eq!(cfg.load.batch_size, 100);
        assert_eq!(cfg.load.retry.max_attempts, 5);
        assert!(cfg.load.retry.retry_on_failure);
        assert!(!cfg.scan_existing);
    }

    #[test]
    fn relative_roots_join_base_dir() {
        let cfg = IngestConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(
            cfg.resolved_targets(),
            vec![
                WatchTarget::new("/srv/import/office", "office"),
                WatchTarget::new(PathBuf::from("/mnt/results"), "result"),
            ]
        );
    }

    #[test]
    fn defaults_match_fail_fast_loader() {
        let cfg = IngestConfig::from_toml_str("[[targets]]\nroot = \"a\"\ncategory = \"a\"\n").unwrap();
        assert_eq!(cfg.load.batch_size, 30);
        assert_eq!(cfg.load.retry.max_attempts, 3);
        assert!(!cfg.load.retry.retry_on_failure);
        assert_eq!(cfg.resolution, CategoryResolution::Explicit);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let err = IngestConfig::from_toml_str("workers = 1\n").unwrap_err();
        assert!(err.to_string().contains("at least one watch target"));

        let err = IngestConfig::from_toml_str(
            "[load]\nbatch_size = 0\n[[targets]]\nroot = \"a\"\ncategory = \"a\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("batch_size must be > 0"));

        let err = IngestConfig::from_toml_str(
            "file_filter = \"[\"\n[[targets]]\nroot = \"a\"\ncategory = \"a\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid file filter"));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = IngestConfig::from_toml_str("targets = 3").unwrap_err();
        assert!(err.to_string().starts_with("config error"));
    }
}
