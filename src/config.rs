use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the document and the audit log.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_document_file")]
    pub document_file: String,
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PolicyConfig {
    /// When set, role discriminators in stored records must use the canonical
    /// capitalized form ("Admin"); otherwise parsing is case-insensitive.
    /// Authorization itself always compares closed enum variants.
    #[serde(default)]
    pub strict_roles: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_document_file() -> String {
    "records.json".to_string()
}

fn default_audit_file() -> String {
    "logs.txt".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            document_file: default_document_file(),
            audit_file: default_audit_file(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file. Every section and key has a
    /// default, so an empty file is a valid configuration.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content).context("failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// A config rooted at a specific data directory, defaults elsewhere.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let mut config = Config::default();
        config.storage.data_dir = data_dir.into();
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.document_file.is_empty() {
            bail!("document_file must not be empty");
        }
        if self.storage.audit_file.is_empty() {
            bail!("audit_file must not be empty");
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!(
                "invalid log level '{}', must be one of: trace, debug, info, warn, error",
                self.logging.level
            );
        }
        Ok(())
    }

    pub fn document_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.document_file)
    }

    pub fn audit_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.audit_file)
    }
}
