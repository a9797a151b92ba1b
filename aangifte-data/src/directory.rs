use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use aangifte_core::{
    FetchedTables, RateTableSource, SourceConfig, SourceError, SourceFactory, SourceRegistry,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::loader::{RateTableLoader, RateTableRecords};

pub const BACKEND_NAME: &str = "csv-dir";

/// Reads rate tables from a directory of CSV files:
///
/// | file             | required |
/// |------------------|----------|
/// | `tables.csv`     | yes      |
/// | `brackets.csv`   | yes      |
/// | `thresholds.csv` | no       |
/// | `credits.csv`    | no       |
/// | `deductions.csv` | no       |
///
/// A missing optional file means no rows of that kind.
#[derive(Debug, Clone)]
pub struct CsvDirectorySource {
    dir: PathBuf,
}

impl CsvDirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read<T: DeserializeOwned>(
        &self,
        file: &str,
        required: bool,
    ) -> Result<Vec<T>, SourceError> {
        let path = self.dir.join(file);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound && !required => {
                debug!(path = %path.display(), "optional rate table file absent");
                return Ok(Vec::new());
            }
            Err(err) => {
                return Err(SourceError::Unavailable {
                    location: path.display().to_string(),
                    message: err.to_string(),
                });
            }
        };

        RateTableLoader::parse(contents.as_bytes()).map_err(|err| SourceError::Malformed {
            location: path.display().to_string(),
            message: err.to_string(),
        })
    }
}

#[async_trait]
impl RateTableSource for CsvDirectorySource {
    fn describe(&self) -> String {
        format!("{BACKEND_NAME}:{}", self.dir.display())
    }

    async fn fetch(&self) -> Result<FetchedTables, SourceError> {
        let records = RateTableRecords {
            tables: self.read("tables.csv", true).await?,
            brackets: self.read("brackets.csv", true).await?,
            thresholds: self.read("thresholds.csv", false).await?,
            credits: self.read("credits.csv", false).await?,
            deductions: self.read("deductions.csv", false).await?,
        };

        RateTableLoader::assemble(records).map_err(|err| SourceError::Malformed {
            location: self.dir.display().to_string(),
            message: err.to_string(),
        })
    }
}

pub struct CsvDirectoryFactory;

#[async_trait]
impl SourceFactory for CsvDirectoryFactory {
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn create(
        &self,
        config: &SourceConfig,
    ) -> Result<Box<dyn RateTableSource>, SourceError> {
        let dir = PathBuf::from(&config.location);
        if !tokio::fs::metadata(&dir)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
        {
            return Err(SourceError::Unavailable {
                location: config.location.clone(),
                message: "not a directory".to_string(),
            });
        }
        Ok(Box::new(CsvDirectorySource::new(dir)))
    }
}

/// A source registry with every backend this crate provides.
pub fn default_sources() -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    registry.register(Box::new(CsvDirectoryFactory));
    registry
}
