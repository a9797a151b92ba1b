//! The work behind each subcommand, kept apart from argument parsing so it
//! can be driven from tests.

use std::path::Path;
use std::sync::Arc;

use aangifte_core::source::load_registry;
use aangifte_core::{
    CalculationResult, DeclarationId, DeclarationStatus, FilingError, FilingService,
    NewDeclaration, RateTableRegistry, ValidationError,
};
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Settings;

/// What a command produced. `Rejected` carries the validation errors that
/// stopped the declaration.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Outcome {
    Valid {
        status: DeclarationStatus,
    },
    Calculated {
        calculation: CalculationResult,
    },
    Filed {
        id: DeclarationId,
        status: DeclarationStatus,
        calculation: CalculationResult,
    },
    Rejected {
        errors: Vec<Reported>,
    },
}

impl Outcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// A validation error as printed: field, machine code, message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reported {
    pub field: String,
    pub code: &'static str,
    pub message: String,
}

impl From<&ValidationError> for Reported {
    fn from(error: &ValidationError) -> Self {
        Self {
            field: error.field.clone(),
            code: error.code(),
            message: error.rule.to_string(),
        }
    }
}

pub async fn build_registry(settings: &Settings) -> Result<RateTableRegistry> {
    debug!(
        backend = %settings.source.backend,
        location = %settings.source.location,
        "opening rate table source"
    );
    let sources = aangifte_data::default_sources();
    let source = sources
        .create(&settings.source)
        .await
        .with_context(|| format!("Failed to open rate tables at {}", settings.source.location))?;

    load_registry(&*source, settings.policy)
        .await
        .with_context(|| format!("Failed to load rate tables from {}", source.describe()))
}

pub fn read_declaration(path: &Path) -> Result<NewDeclaration> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to open: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse declaration: {}", path.display()))
}

/// One line per published table, then one per quarantined key.
pub fn describe_tables(registry: &RateTableRegistry) -> Vec<String> {
    let snapshot = registry.snapshot();
    let mut lines = Vec::new();

    for key in snapshot.keys() {
        if let Ok(table) = snapshot.lookup(key) {
            lines.push(format!(
                "{key}  version {}  {} brackets  {} credits  {} deductions",
                table.version(),
                table.brackets().len(),
                table.credit_rules().len(),
                table.deduction_rules().len(),
            ));
        }
    }
    for (key, fault) in snapshot.faults() {
        lines.push(format!("{key}  QUARANTINED: {fault}"));
    }

    lines
}

/// Splits validation failures off from every other error.
fn outcome<T>(
    result: Result<T, FilingError>,
    ok: impl FnOnce(T) -> Outcome,
) -> Result<Outcome> {
    match result {
        Ok(value) => Ok(ok(value)),
        Err(FilingError::Invalid(errors)) => Ok(Outcome::Rejected {
            errors: errors.iter().map(Reported::from).collect(),
        }),
        Err(err) => Err(err.into()),
    }
}

/// `Draft -> Validated` without going further.
pub fn validate(
    registry: Arc<RateTableRegistry>,
    declaration: NewDeclaration,
) -> Result<Outcome> {
    let service = FilingService::new(registry);
    let id = service.create(declaration)?;
    outcome(service.validate(id), |status| Outcome::Valid { status })
}

pub fn calculate(
    registry: Arc<RateTableRegistry>,
    declaration: NewDeclaration,
) -> Result<Outcome> {
    let service = FilingService::new(registry);
    let id = service.create(declaration)?;
    outcome(service.preview(id), |calculation| Outcome::Calculated { calculation })
}

/// Validates and submits in a fresh in-memory store.
pub fn file(
    registry: Arc<RateTableRegistry>,
    declaration: NewDeclaration,
) -> Result<Outcome> {
    let service = FilingService::new(registry);
    let id = service.create(declaration)?;

    let validated = outcome(service.validate(id), |status| Outcome::Valid { status })?;
    if validated.is_rejected() {
        return Ok(validated);
    }

    let status = service.submit(id)?;
    let filed = service.get(id)?;
    let calculation = filed
        .calculation()
        .cloned()
        .context("submitted declaration has no calculation")?;
    info!(declaration = %id, %status, net = %calculation.net_amount, "declaration filed");

    Ok(Outcome::Filed {
        id,
        status,
        calculation,
    })
}
