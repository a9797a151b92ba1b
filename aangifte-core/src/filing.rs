//! Filing pipeline over a store of declarations.
//!
//! Every declaration sits behind its own mutex. The service runs each
//! step (edit, validate, submit, ...) while holding that mutex, so a
//! submission can never act on a validation that an edit has since made
//! stale, and unrelated declarations never wait on each other.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info};

use crate::calculations::calculate;
use crate::error::{FilingError, StateError};
use crate::lifecycle::{self, ProcessingEvent};
use crate::models::{
    CalculationResult, Declaration, DeclarationContent, DeclarationId, DeclarationStatus,
    FilingKey, NewDeclaration, RateTable,
};
use crate::registry::RateTableRegistry;
use crate::resolver::resolve;
use crate::validation::validate_declaration;

/// Validates, resolves and calculates `declaration` against `table` without
/// changing it.
///
/// Field errors and rejected claims are reported together, field errors
/// first. A resolution that fails outright only surfaces once the fields
/// are valid.
pub fn assess(
    declaration: &Declaration,
    table: &RateTable,
) -> Result<CalculationResult, FilingError> {
    match (validate_declaration(declaration), resolve(declaration, table)) {
        (Ok(validated), Ok(resolution)) if resolution.is_clean() => {
            Ok(calculate(validated, table, &resolution)?)
        }
        (Ok(_), Ok(resolution)) => Err(FilingError::Invalid(resolution.errors)),
        (Ok(_), Err(err)) => Err(err.into()),
        (Err(mut errors), Ok(resolution)) => {
            errors.extend(resolution.errors);
            Err(FilingError::Invalid(errors))
        }
        (Err(errors), Err(_)) => Err(FilingError::Invalid(errors)),
    }
}

/// In-memory declarations with per-declaration exclusive access.
///
/// Only one live declaration may exist per [`FilingKey`]. A declaration stays
/// live until it is amended; its amendment then takes over the key.
#[derive(Debug, Default)]
pub struct DeclarationStore {
    next_id: AtomicU64,
    declarations: RwLock<BTreeMap<DeclarationId, Arc<Mutex<Declaration>>>>,
    live: Mutex<BTreeMap<FilingKey, DeclarationId>>,
}

impl DeclarationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> DeclarationId {
        DeclarationId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn insert(
        &self,
        declaration: Declaration,
    ) {
        let mut declarations = self.declarations.write().unwrap_or_else(|err| err.into_inner());
        declarations.insert(declaration.id(), Arc::new(Mutex::new(declaration)));
    }

    fn slot(
        &self,
        id: DeclarationId,
    ) -> Result<Arc<Mutex<Declaration>>, StateError> {
        let declarations = self.declarations.read().unwrap_or_else(|err| err.into_inner());
        declarations
            .get(&id)
            .cloned()
            .ok_or(StateError::UnknownDeclaration(id))
    }

    /// Adds a new draft.
    ///
    /// # Errors
    ///
    /// [`StateError::DuplicateFiling`] when the taxpayer already has a live
    /// declaration for the same year and category.
    pub fn create(
        &self,
        new: NewDeclaration,
    ) -> Result<DeclarationId, StateError> {
        let mut live = self.live.lock().unwrap_or_else(|err| err.into_inner());

        let declaration = Declaration::new(self.allocate_id(), new);
        let key = declaration.filing_key();
        if let Some(existing) = live.get(&key) {
            return Err(StateError::DuplicateFiling {
                key,
                existing: *existing,
            });
        }

        let id = declaration.id();
        live.insert(key, id);
        self.insert(declaration);
        debug!(declaration = %id, "created declaration");
        Ok(id)
    }

    /// A copy of the declaration as it is now.
    pub fn get(
        &self,
        id: DeclarationId,
    ) -> Result<Declaration, StateError> {
        let slot = self.slot(id)?;
        let declaration = slot.lock().unwrap_or_else(|err| err.into_inner());
        Ok(declaration.clone())
    }

    /// Runs `f` with exclusive access to the declaration.
    pub fn with_declaration<T, F>(
        &self,
        id: DeclarationId,
        f: F,
    ) -> Result<T, StateError>
    where
        F: FnOnce(&mut Declaration) -> T,
    {
        let slot = self.slot(id)?;
        let mut declaration = slot.lock().unwrap_or_else(|err| err.into_inner());
        Ok(f(&mut declaration))
    }

    /// Closes `id` as amended and stores its replacement draft, which takes
    /// over the filing key.
    pub fn amend(
        &self,
        id: DeclarationId,
    ) -> Result<DeclarationId, StateError> {
        let amendment = self.with_declaration(id, |closed| {
            lifecycle::amend(closed, self.allocate_id())
        })??;

        let amendment_id = amendment.id();
        let key = amendment.filing_key();
        self.insert(amendment);
        self.live
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .insert(key, amendment_id);

        info!(declaration = %id, amendment = %amendment_id, "declaration amended");
        Ok(amendment_id)
    }

    /// Ids of every stored declaration, in order.
    pub fn ids(&self) -> Vec<DeclarationId> {
        let declarations = self.declarations.read().unwrap_or_else(|err| err.into_inner());
        declarations.keys().copied().collect()
    }
}

/// Runs declarations through their lifecycle against the shared rate tables.
#[derive(Debug)]
pub struct FilingService {
    registry: Arc<RateTableRegistry>,
    store: DeclarationStore,
}

impl FilingService {
    pub fn new(registry: Arc<RateTableRegistry>) -> Self {
        Self {
            registry,
            store: DeclarationStore::new(),
        }
    }

    pub fn registry(&self) -> &RateTableRegistry {
        &self.registry
    }

    pub fn store(&self) -> &DeclarationStore {
        &self.store
    }

    pub fn create(
        &self,
        new: NewDeclaration,
    ) -> Result<DeclarationId, FilingError> {
        Ok(self.store.create(new)?)
    }

    pub fn get(
        &self,
        id: DeclarationId,
    ) -> Result<Declaration, FilingError> {
        Ok(self.store.get(id)?)
    }

    /// Edits the content of an editable declaration.
    pub fn edit<F>(
        &self,
        id: DeclarationId,
        edit: F,
    ) -> Result<DeclarationStatus, FilingError>
    where
        F: FnOnce(&mut DeclarationContent),
    {
        Ok(self.store.with_declaration(id, |declaration| declaration.edit(edit))??)
    }

    /// The calculation the declaration would get, without changing it.
    pub fn preview(
        &self,
        id: DeclarationId,
    ) -> Result<CalculationResult, FilingError> {
        self.store.with_declaration(id, |declaration| {
            let table = self
                .registry
                .lookup(declaration.tax_year(), declaration.category())?;
            assess(declaration, &table)
        })?
    }

    pub fn validate(
        &self,
        id: DeclarationId,
    ) -> Result<DeclarationStatus, FilingError> {
        self.store.with_declaration(id, |declaration| {
            let table = self
                .registry
                .lookup(declaration.tax_year(), declaration.category())?;
            lifecycle::validate(declaration, &table)
        })?
    }

    pub fn submit(
        &self,
        id: DeclarationId,
    ) -> Result<DeclarationStatus, FilingError> {
        Ok(self.store.with_declaration(id, lifecycle::submit)??)
    }

    pub fn record(
        &self,
        id: DeclarationId,
        event: ProcessingEvent,
    ) -> Result<DeclarationStatus, FilingError> {
        Ok(self
            .store
            .with_declaration(id, |declaration| lifecycle::record(declaration, event))??)
    }

    pub fn amend(
        &self,
        id: DeclarationId,
    ) -> Result<DeclarationId, FilingError> {
        Ok(self.store.amend(id)?)
    }
}
