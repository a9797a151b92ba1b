use std::path::{Path, PathBuf};

use aangifte_core::{LoadPolicy, SourceConfig};
use anyhow::{Context, Result};
use serde::Deserialize;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "aangifte.toml";

/// Contents of `aangifte.toml`. Every key is optional.
///
/// ```toml
/// rate_tables = "/etc/aangifte/tables"
/// source_backend = "csv-dir"
/// quarantine = true
/// log_level = "debug"
/// log_file = "aangifte.log"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub rate_tables: Option<String>,
    pub source_backend: Option<String>,
    pub quarantine: Option<bool>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl FileConfig {
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Reads `path`, or [`DEFAULT_CONFIG_FILE`] if it exists. An explicit
    /// path that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };

        if !explicit && !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }
}

/// Settings given on the command line; they win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub rate_tables: Option<String>,
    pub source_backend: Option<String>,
    pub quarantine: bool,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub source: SourceConfig,
    pub policy: LoadPolicy,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Settings {
    pub fn resolve(
        file: FileConfig,
        overrides: Overrides,
    ) -> Self {
        let defaults = SourceConfig::default();
        let quarantine = overrides.quarantine || file.quarantine.unwrap_or(false);

        Self {
            source: SourceConfig {
                backend: overrides
                    .source_backend
                    .or(file.source_backend)
                    .unwrap_or(defaults.backend),
                location: overrides
                    .rate_tables
                    .or(file.rate_tables)
                    .unwrap_or(defaults.location),
            },
            policy: if quarantine {
                LoadPolicy::Quarantine
            } else {
                LoadPolicy::Strict
            },
            log_level: overrides
                .log_level
                .or(file.log_level)
                .unwrap_or_else(|| "info".to_string()),
            log_file: overrides.log_file.or(file.log_file),
        }
    }
}
