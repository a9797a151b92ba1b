use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::error::ConfigurationFault;
use crate::models::RateTableDefinition;
use crate::registry::{LoadPolicy, RateTableRegistry, RateTableSet};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unknown rate table backend '{requested}'; available: {available:?}")]
    UnknownBackend {
        requested: String,
        available: Vec<&'static str>,
    },

    #[error("cannot read rate tables from {location}: {message}")]
    Unavailable { location: String, message: String },

    #[error("malformed rate table data in {location}: {message}")]
    Malformed { location: String, message: String },

    #[error(transparent)]
    Configuration(#[from] ConfigurationFault),
}

/// Where rate tables come from.
///
/// `backend` must match the [`SourceFactory::backend_name`] of a registered
/// factory. `location` is handed to that factory unchanged.
///
/// | backend   | location examples        |
/// |-----------|--------------------------|
/// | `csv-dir` | `rate-tables`, `/etc/aangifte/tables` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub backend: String,
    pub location: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            backend: "csv-dir".to_string(),
            location: "rate-tables".to_string(),
        }
    }
}

/// What one fetch produced.
///
/// A key whose rows could not be read has a fault instead of a definition,
/// so the load policy decides whether it sinks the whole load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedTables {
    pub definitions: Vec<RateTableDefinition>,
    pub faults: Vec<ConfigurationFault>,
}

impl From<Vec<RateTableDefinition>> for FetchedTables {
    fn from(definitions: Vec<RateTableDefinition>) -> Self {
        Self {
            definitions,
            faults: Vec::new(),
        }
    }
}

/// Supplies rate table definitions. Reading them is the only I/O the
/// engine depends on.
#[async_trait]
pub trait RateTableSource: Send + Sync {
    /// Human-readable origin, used in logs.
    fn describe(&self) -> String;

    /// Reads every table. Only a failure of the source as a whole is an
    /// error; a broken table is reported in [`FetchedTables::faults`].
    async fn fetch(&self) -> Result<FetchedTables, SourceError>;
}

/// One implementation per source backend, registered with a
/// [`SourceRegistry`] at startup.
#[async_trait]
pub trait SourceFactory: Send + Sync {
    /// Unique, lowercase identifier for this backend.
    fn backend_name(&self) -> &'static str;

    async fn create(
        &self,
        config: &SourceConfig,
    ) -> Result<Box<dyn RateTableSource>, SourceError>;
}

/// Source factories keyed by backend name.
#[derive(Default)]
pub struct SourceRegistry {
    factories: HashMap<&'static str, Box<dyn SourceFactory>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory`, replacing any factory with the same name.
    pub fn register(
        &mut self,
        factory: Box<dyn SourceFactory>,
    ) {
        self.factories.insert(factory.backend_name(), factory);
    }

    /// Names of every registered backend, sorted alphabetically.
    pub fn available_backends(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Creates the source `config.backend` names.
    pub async fn create(
        &self,
        config: &SourceConfig,
    ) -> Result<Box<dyn RateTableSource>, SourceError> {
        let factory = self
            .factories
            .get(config.backend.as_str())
            .ok_or_else(|| SourceError::UnknownBackend {
                requested: config.backend.clone(),
                available: self.available_backends(),
            })?;

        factory.create(config).await
    }
}

/// Fetches every definition from `source` into a new registry.
pub async fn load_registry(
    source: &dyn RateTableSource,
    policy: LoadPolicy,
) -> Result<RateTableRegistry, SourceError> {
    let registry = RateTableRegistry::new();
    reload_registry(&registry, source, policy).await?;
    Ok(registry)
}

/// Fetches again from `source` and swaps the result into `registry`.
/// The current tables stay in place when fetching or building fails.
pub async fn reload_registry(
    registry: &RateTableRegistry,
    source: &dyn RateTableSource,
    policy: LoadPolicy,
) -> Result<(), SourceError> {
    let fetched = source.fetch().await?;
    info!(
        source = %source.describe(),
        definitions = fetched.definitions.len(),
        faults = fetched.faults.len(),
        "fetched rate tables"
    );
    let set = RateTableSet::build_with_faults(fetched.definitions, fetched.faults, policy)?;
    registry.install(set);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fixtures;
    use crate::models::{DeclarationCategory, RateTableKey};
    use crate::registry::RegistryError;

    // ── stub source ──────────────────────────────────────────────────────
    struct StubSource {
        fetched: FetchedTables,
    }

    #[async_trait]
    impl RateTableSource for StubSource {
        fn describe(&self) -> String {
            "stub".to_string()
        }

        async fn fetch(&self) -> Result<FetchedTables, SourceError> {
            Ok(self.fetched.clone())
        }
    }

    struct UnavailableSource;

    #[async_trait]
    impl RateTableSource for UnavailableSource {
        fn describe(&self) -> String {
            "unavailable".to_string()
        }

        async fn fetch(&self) -> Result<FetchedTables, SourceError> {
            Err(SourceError::Unavailable {
                location: "nowhere".to_string(),
                message: "offline".to_string(),
            })
        }
    }

    // ── stub factory ─────────────────────────────────────────────────────
    struct StubFactory {
        name: &'static str,
        called: Arc<AtomicBool>,
    }

    #[async_trait]
    impl SourceFactory for StubFactory {
        fn backend_name(&self) -> &'static str {
            self.name
        }

        async fn create(
            &self,
            _config: &SourceConfig,
        ) -> Result<Box<dyn RateTableSource>, SourceError> {
            self.called.store(true, Ordering::SeqCst);
            Ok(Box::new(StubSource {
                fetched: vec![fixtures::definition(2024, DeclarationCategory::Resident)].into(),
            }))
        }
    }

    fn stub_factory(name: &'static str) -> (Box<dyn SourceFactory>, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        (
            Box::new(StubFactory {
                name,
                called: flag.clone(),
            }),
            flag,
        )
    }

    fn config(backend: &str) -> SourceConfig {
        SourceConfig {
            backend: backend.to_string(),
            location: "x".to_string(),
        }
    }

    // ── SourceConfig ─────────────────────────────────────────────────────
    #[test]
    fn default_config_reads_csv_directory() {
        let config = SourceConfig::default();
        assert_eq!(config.backend, "csv-dir");
        assert_eq!(config.location, "rate-tables");
    }

    // ── registration ─────────────────────────────────────────────────────
    #[test]
    fn available_backends_is_sorted() {
        let mut registry = SourceRegistry::new();
        let (csv, _) = stub_factory("csv-dir");
        let (http, _) = stub_factory("http");
        registry.register(http);
        registry.register(csv);
        assert_eq!(registry.available_backends(), vec!["csv-dir", "http"]);
    }

    #[test]
    fn duplicate_registration_replaces_previous() {
        let mut registry = SourceRegistry::new();
        let (old, _) = stub_factory("csv-dir");
        let (new, _) = stub_factory("csv-dir");
        registry.register(old);
        registry.register(new);
        assert_eq!(registry.available_backends(), vec!["csv-dir"]);
    }

    // ── dispatch ─────────────────────────────────────────────────────────
    #[tokio::test]
    async fn create_calls_matching_factory() {
        let mut registry = SourceRegistry::new();
        let (csv, csv_called) = stub_factory("csv-dir");
        let (http, http_called) = stub_factory("http");
        registry.register(csv);
        registry.register(http);

        let source = registry.create(&config("csv-dir")).await.unwrap();

        assert_eq!(source.describe(), "stub");
        assert!(csv_called.load(Ordering::SeqCst));
        assert!(!http_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unknown_backend_names_requested_and_available() {
        let mut registry = SourceRegistry::new();
        let (csv, _) = stub_factory("csv-dir");
        registry.register(csv);

        let err = registry.create(&config("s3")).await.err().unwrap();

        let message = err.to_string();
        assert!(message.contains("s3"), "{message}");
        assert!(message.contains("csv-dir"), "{message}");
    }

    // ── loading ──────────────────────────────────────────────────────────
    #[tokio::test]
    async fn load_registry_builds_tables_from_source() {
        let source = StubSource {
            fetched: vec![
                fixtures::definition(2024, DeclarationCategory::Resident),
                fixtures::definition(2025, DeclarationCategory::Resident),
            ]
            .into(),
        };

        let registry = load_registry(&source, LoadPolicy::Strict).await.unwrap();

        assert_eq!(registry.keys().len(), 2);
    }

    #[tokio::test]
    async fn fetched_faults_are_quarantined_per_key() {
        let broken = RateTableKey::new(2025, DeclarationCategory::Resident);
        let source = StubSource {
            fetched: FetchedTables {
                definitions: vec![fixtures::definition(2024, DeclarationCategory::Resident)],
                faults: vec![ConfigurationFault::MalformedEntry {
                    key: broken,
                    detail: "unknown credit type 'bonus-credit'".to_string(),
                }],
            },
        };

        let err = load_registry(&source, LoadPolicy::Strict).await.unwrap_err();
        assert!(matches!(
            err,
            SourceError::Configuration(ConfigurationFault::MalformedEntry { .. })
        ));

        let registry = load_registry(&source, LoadPolicy::Quarantine).await.unwrap();
        assert!(registry.lookup(2024, DeclarationCategory::Resident).is_ok());
        assert!(matches!(
            registry.lookup(2025, DeclarationCategory::Resident),
            Err(RegistryError::Configuration(ConfigurationFault::MalformedEntry { .. }))
        ));
    }

    #[tokio::test]
    async fn failed_fetch_keeps_current_tables() {
        let registry = RateTableRegistry::load(
            vec![fixtures::definition(2024, DeclarationCategory::Resident)],
            LoadPolicy::Strict,
        )
        .unwrap();

        let err = reload_registry(&registry, &UnavailableSource, LoadPolicy::Strict)
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::Unavailable { .. }));
        assert!(registry.lookup(2024, DeclarationCategory::Resident).is_ok());
    }
}
