//! Declaration lifecycle.
//!
//! ```text
//! Draft -> Validated -> Submitted -> Processing -> Approved
//!                                              \-> Rejected
//! Approved | Rejected --amend--> Amended (plus a new linked Draft)
//! ```
//!
//! Every transition checks its edge and its guard before touching the
//! declaration, so a failed transition leaves it exactly as it was.

use tracing::info;

use crate::error::{FilingError, StateError};
use crate::filing::assess;
use crate::models::{Declaration, DeclarationId, DeclarationStatus, RateTable};

impl DeclarationStatus {
    /// States reachable from this one in a single step.
    pub fn valid_transitions(self) -> &'static [DeclarationStatus] {
        match self {
            Self::Draft => &[Self::Validated],
            Self::Validated => &[Self::Submitted],
            Self::Submitted => &[Self::Processing],
            Self::Processing => &[Self::Approved, Self::Rejected],
            Self::Approved | Self::Rejected => &[Self::Amended],
            Self::Amended => &[],
        }
    }

    pub fn can_transition_to(
        self,
        target: Self,
    ) -> bool {
        self.valid_transitions().contains(&target)
    }

    /// Whether the filing for this declaration is finished.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Amended)
    }
}

/// Outcome of processing, reported by the tax authority's back office.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingEvent {
    BeginProcessing,
    Approve,
    Reject,
}

impl ProcessingEvent {
    pub fn target(self) -> DeclarationStatus {
        match self {
            Self::BeginProcessing => DeclarationStatus::Processing,
            Self::Approve => DeclarationStatus::Approved,
            Self::Reject => DeclarationStatus::Rejected,
        }
    }
}

fn check_edge(
    declaration: &Declaration,
    to: DeclarationStatus,
) -> Result<(), StateError> {
    let from = declaration.status();
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(StateError::InvalidTransition { from, to })
    }
}

fn transition(
    declaration: &mut Declaration,
    to: DeclarationStatus,
) -> DeclarationStatus {
    let from = declaration.status();
    declaration.set_status(to);
    info!(declaration = %declaration.id(), %from, %to, "declaration transitioned");
    to
}

/// `Draft -> Validated`.
///
/// Validates the declaration, resolves its claims against `table` and
/// calculates it. Only when all three succeed is the calculation attached
/// and the status moved on.
pub fn validate(
    declaration: &mut Declaration,
    table: &RateTable,
) -> Result<DeclarationStatus, FilingError> {
    check_edge(declaration, DeclarationStatus::Validated)?;
    let calculation = assess(declaration, table)?;
    declaration.set_calculation(calculation);
    Ok(transition(declaration, DeclarationStatus::Validated))
}

/// `Validated -> Submitted`. Requires an attached calculation.
pub fn submit(declaration: &mut Declaration) -> Result<DeclarationStatus, StateError> {
    check_edge(declaration, DeclarationStatus::Submitted)?;
    if declaration.calculation().is_none() {
        return Err(StateError::CalculationMissing);
    }
    Ok(transition(declaration, DeclarationStatus::Submitted))
}

/// Records a processing outcome.
pub fn record(
    declaration: &mut Declaration,
    event: ProcessingEvent,
) -> Result<DeclarationStatus, StateError> {
    check_edge(declaration, event.target())?;
    Ok(transition(declaration, event.target()))
}

/// `Approved | Rejected -> Amended`, returning the amendment: a new draft
/// with `closed`'s content, linked back to it.
pub fn amend(
    closed: &mut Declaration,
    id: DeclarationId,
) -> Result<Declaration, StateError> {
    check_edge(closed, DeclarationStatus::Amended)?;
    let amendment = Declaration::amendment_of(id, closed);
    transition(closed, DeclarationStatus::Amended);
    Ok(amendment)
}
