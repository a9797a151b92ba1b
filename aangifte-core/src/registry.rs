//! The set of published rate tables, shared by every calculation.
//!
//! Tables are looked up by `(tax_year, category)`. A key with no table is
//! [`RegistryError::NotFound`] (nothing published yet), which callers must
//! keep apart from [`RegistryError::Configuration`] (a table was published
//! but is broken).
//!
//! The registry holds an [`Arc`] snapshot behind a lock. [`reload`] builds a
//! complete new set first and then swaps it in, so a reader either sees the
//! old set or the new one, never a mix.
//!
//! [`reload`]: RateTableRegistry::reload

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::{info, warn};

use crate::error::ConfigurationFault;
use crate::models::{DeclarationCategory, RateTable, RateTableDefinition, RateTableKey};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no rate table published for {0}")]
    NotFound(RateTableKey),

    #[error(transparent)]
    Configuration(#[from] ConfigurationFault),
}

/// How faulty definitions are handled while loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// The first fault fails the whole load.
    #[default]
    Strict,
    /// A fault is recorded against its key; other keys stay usable.
    Quarantine,
}

/// One immutable generation of rate tables.
#[derive(Debug, Default)]
pub struct RateTableSet {
    tables: BTreeMap<RateTableKey, Arc<RateTable>>,
    faults: BTreeMap<RateTableKey, ConfigurationFault>,
}

impl RateTableSet {
    /// Builds every definition, applying `policy` to the ones that fail.
    pub fn build(
        definitions: Vec<RateTableDefinition>,
        policy: LoadPolicy,
    ) -> Result<Self, ConfigurationFault> {
        Self::build_with_faults(definitions, Vec::new(), policy)
    }

    /// Like [`build`](Self::build), with `faults` a source already found for
    /// keys it could not turn into a definition.
    pub fn build_with_faults(
        definitions: Vec<RateTableDefinition>,
        faults: Vec<ConfigurationFault>,
        policy: LoadPolicy,
    ) -> Result<Self, ConfigurationFault> {
        let mut set = Self::default();

        for definition in definitions {
            let key = definition.key();
            let built = if set.tables.contains_key(&key) || set.faults.contains_key(&key) {
                Err(ConfigurationFault::DuplicateTable { key })
            } else {
                RateTable::try_from(definition)
            };

            match (built, policy) {
                (Ok(table), _) => {
                    set.tables.insert(key, Arc::new(table));
                }
                (Err(fault), LoadPolicy::Strict) => return Err(fault),
                (Err(fault), LoadPolicy::Quarantine) => set.quarantine(fault),
            }
        }

        for fault in faults {
            match policy {
                LoadPolicy::Strict => return Err(fault),
                LoadPolicy::Quarantine => set.quarantine(fault),
            }
        }

        Ok(set)
    }

    fn quarantine(&mut self, fault: ConfigurationFault) {
        let key = fault.key();
        warn!(table = %key, error = %fault, "quarantined rate table");
        // A duplicated key is ambiguous, so neither copy is served.
        self.tables.remove(&key);
        self.faults.entry(key).or_insert(fault);
    }

    pub fn lookup(
        &self,
        key: RateTableKey,
    ) -> Result<Arc<RateTable>, RegistryError> {
        if let Some(fault) = self.faults.get(&key) {
            return Err(RegistryError::Configuration(fault.clone()));
        }
        self.tables
            .get(&key)
            .cloned()
            .ok_or(RegistryError::NotFound(key))
    }

    /// Keys of the usable tables, in order.
    pub fn keys(&self) -> Vec<RateTableKey> {
        self.tables.keys().copied().collect()
    }

    pub fn faults(&self) -> &BTreeMap<RateTableKey, ConfigurationFault> {
        &self.faults
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Shared, read-mostly access to the current [`RateTableSet`].
#[derive(Debug, Default)]
pub struct RateTableRegistry {
    current: RwLock<Arc<RateTableSet>>,
}

impl RateTableRegistry {
    /// An empty registry; every lookup is `NotFound`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(
        definitions: Vec<RateTableDefinition>,
        policy: LoadPolicy,
    ) -> Result<Self, ConfigurationFault> {
        let registry = Self::new();
        registry.reload(definitions, policy)?;
        Ok(registry)
    }

    /// Replaces every table at once. On error the current set stays in place.
    pub fn reload(
        &self,
        definitions: Vec<RateTableDefinition>,
        policy: LoadPolicy,
    ) -> Result<(), ConfigurationFault> {
        self.install(RateTableSet::build(definitions, policy)?);
        Ok(())
    }

    /// Swaps in a set that is already built.
    pub fn install(&self, set: RateTableSet) {
        info!(
            tables = set.len(),
            quarantined = set.faults().len(),
            "loaded rate tables"
        );

        let mut current = self.current.write().unwrap_or_else(|err| err.into_inner());
        *current = Arc::new(set);
    }

    /// The current generation. Holding it keeps a consistent view across a reload.
    pub fn snapshot(&self) -> Arc<RateTableSet> {
        let current = self.current.read().unwrap_or_else(|err| err.into_inner());
        Arc::clone(&*current)
    }

    pub fn lookup(
        &self,
        tax_year: i32,
        category: DeclarationCategory,
    ) -> Result<Arc<RateTable>, RegistryError> {
        self.snapshot().lookup(RateTableKey::new(tax_year, category))
    }

    pub fn keys(&self) -> Vec<RateTableKey> {
        self.snapshot().keys()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::fixtures;

    fn broken(tax_year: i32) -> RateTableDefinition {
        let mut definition = fixtures::definition(tax_year, DeclarationCategory::Resident);
        definition.brackets[1].lower_bound = dec!(70000);
        definition
    }

    // =========================================================================
    // lookup tests
    // =========================================================================

    #[test]
    fn lookup_finds_published_table() {
        let registry = RateTableRegistry::load(
            vec![
                fixtures::definition(2024, DeclarationCategory::Resident),
                fixtures::definition(2024, DeclarationCategory::NonResident),
            ],
            LoadPolicy::Strict,
        )
        .unwrap();

        let table = registry.lookup(2024, DeclarationCategory::NonResident).unwrap();

        assert_eq!(table.key(), RateTableKey::new(2024, DeclarationCategory::NonResident));
        assert_eq!(registry.keys().len(), 2);
    }

    #[test]
    fn unpublished_year_is_not_found() {
        let registry = RateTableRegistry::load(
            vec![fixtures::definition(2024, DeclarationCategory::Resident)],
            LoadPolicy::Strict,
        )
        .unwrap();

        let err = registry.lookup(2026, DeclarationCategory::Resident).unwrap_err();

        assert_eq!(
            err,
            RegistryError::NotFound(RateTableKey::new(2026, DeclarationCategory::Resident))
        );
    }

    // =========================================================================
    // load policy tests
    // =========================================================================

    #[test]
    fn strict_load_fails_on_first_fault() {
        let err = RateTableRegistry::load(
            vec![fixtures::definition(2024, DeclarationCategory::Resident), broken(2023)],
            LoadPolicy::Strict,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigurationFault::BracketGap { index: 0, .. }));
    }

    #[test]
    fn quarantine_isolates_the_faulty_key() {
        let registry = RateTableRegistry::load(
            vec![fixtures::definition(2024, DeclarationCategory::Resident), broken(2023)],
            LoadPolicy::Quarantine,
        )
        .unwrap();

        assert!(registry.lookup(2024, DeclarationCategory::Resident).is_ok());
        assert!(matches!(
            registry.lookup(2023, DeclarationCategory::Resident),
            Err(RegistryError::Configuration(ConfigurationFault::BracketGap { .. }))
        ));
        assert_eq!(registry.keys(), vec![RateTableKey::new(2024, DeclarationCategory::Resident)]);
    }

    #[test]
    fn duplicate_keys_are_a_fault() {
        let twice = || {
            vec![
                fixtures::definition(2024, DeclarationCategory::Resident),
                fixtures::definition(2024, DeclarationCategory::Resident),
            ]
        };

        assert!(matches!(
            RateTableRegistry::load(twice(), LoadPolicy::Strict),
            Err(ConfigurationFault::DuplicateTable { .. })
        ));

        let registry = RateTableRegistry::load(twice(), LoadPolicy::Quarantine).unwrap();
        assert!(matches!(
            registry.lookup(2024, DeclarationCategory::Resident),
            Err(RegistryError::Configuration(ConfigurationFault::DuplicateTable { .. }))
        ));
    }

    #[test]
    fn faults_found_by_the_source_follow_the_policy() {
        let key = RateTableKey::new(2023, DeclarationCategory::Resident);
        let fault = || ConfigurationFault::DuplicateEntry {
            key,
            item: "credit general-tax-credit".to_string(),
        };

        let err = RateTableSet::build_with_faults(
            vec![fixtures::definition(2024, DeclarationCategory::Resident)],
            vec![fault()],
            LoadPolicy::Strict,
        )
        .unwrap_err();
        assert_eq!(err, fault());

        let set = RateTableSet::build_with_faults(
            vec![
                fixtures::definition(2024, DeclarationCategory::Resident),
                fixtures::definition(2023, DeclarationCategory::Resident),
            ],
            vec![fault()],
            LoadPolicy::Quarantine,
        )
        .unwrap();
        assert_eq!(set.keys(), vec![RateTableKey::new(2024, DeclarationCategory::Resident)]);
        assert_eq!(set.lookup(key).unwrap_err(), RegistryError::Configuration(fault()));
    }

    // =========================================================================
    // reload tests
    // =========================================================================

    #[test]
    fn reload_swaps_the_whole_set() {
        let registry = RateTableRegistry::load(
            vec![fixtures::definition(2024, DeclarationCategory::Resident)],
            LoadPolicy::Strict,
        )
        .unwrap();
        let before = registry.snapshot();

        let mut next = fixtures::definition(2024, DeclarationCategory::Resident);
        next.version = "2024.2".to_string();
        registry
            .reload(
                vec![next, fixtures::definition(2025, DeclarationCategory::Resident)],
                LoadPolicy::Strict,
            )
            .unwrap();

        let key = RateTableKey::new(2024, DeclarationCategory::Resident);
        assert_eq!(before.lookup(key).unwrap().version(), "2024.1");
        assert_eq!(before.len(), 1);
        assert_eq!(registry.lookup(2024, DeclarationCategory::Resident).unwrap().version(), "2024.2");
        assert_eq!(registry.keys().len(), 2);
    }

    #[test]
    fn failed_reload_keeps_current_tables() {
        let registry = RateTableRegistry::load(
            vec![fixtures::definition(2024, DeclarationCategory::Resident)],
            LoadPolicy::Strict,
        )
        .unwrap();

        let result = registry.reload(vec![broken(2025)], LoadPolicy::Strict);

        assert!(result.is_err());
        assert!(registry.lookup(2024, DeclarationCategory::Resident).is_ok());
    }

    #[test]
    fn concurrent_readers_during_reload() {
        let registry = Arc::new(
            RateTableRegistry::load(
                vec![fixtures::definition(2024, DeclarationCategory::Resident)],
                LoadPolicy::Strict,
            )
            .unwrap(),
        );

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let registry = Arc::clone(&registry);
                scope.spawn(move || {
                    for _ in 0..200 {
                        let table = registry.lookup(2024, DeclarationCategory::Resident).unwrap();
                        assert!(matches!(table.version(), "2024.1" | "2024.2"));
                    }
                });
            }
            for round in 0..50 {
                let mut next = fixtures::definition(2024, DeclarationCategory::Resident);
                next.version = format!("2024.{}", 1 + round % 2);
                registry.reload(vec![next], LoadPolicy::Strict).unwrap();
            }
        });
    }
}
