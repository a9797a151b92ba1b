//! Deduction and credit resolution against a rate table.
//!
//! Each claim is checked against the table's rule for its type, capped, and
//! (for credits with a phase-out) reduced by income. Rejected claims become
//! [`ValidationError`]s in the [`Resolution`]; a claim that points at a
//! partner who is not part of the filing fails the whole resolution.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calculations::common::non_negative;
use crate::error::{Rule, StateError, ValidationError};
use crate::models::{
    CreditRule, CreditType, Declaration, DeductionType, PartnerRequirement, Period, RateTable,
    ResolvedCredit, ResolvedDeduction, age_on,
};

/// Outcome of resolving a declaration's claims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub deductions: Vec<ResolvedDeduction>,
    pub credits: Vec<ResolvedCredit>,
    /// Claims that were rejected. The declaration cannot proceed while any remain.
    pub errors: Vec<ValidationError>,
}

impl Resolution {
    pub fn total_deductions(&self) -> Decimal {
        self.deductions.iter().map(|d| d.allowed).sum()
    }

    pub fn total_credits(&self) -> Decimal {
        self.credits.iter().map(|c| c.amount).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Resolves every deduction and credit claim of `declaration` against `table`,
/// then adds the table's automatic credits the taxpayer is eligible for and
/// did not claim.
///
/// # Errors
///
/// - [`StateError::TableMismatch`] when `table` is not the declaration's table.
/// - [`StateError::PartnerCrossReference`] when a claim is shared with a
///   partner absent from the filing.
pub fn resolve(
    declaration: &Declaration,
    table: &RateTable,
) -> Result<Resolution, StateError> {
    if declaration.rate_table_key() != table.key() {
        return Err(StateError::TableMismatch {
            declaration: declaration.rate_table_key(),
            table: table.key(),
        });
    }

    check_partner_references(declaration)?;

    let total_income = declaration
        .content()
        .income
        .iter()
        .try_fold(Decimal::ZERO, |total, record| total.checked_add(record.gross_amount));
    let eligibility = Eligibility::of(declaration);

    let mut resolution = Resolution::default();
    resolve_deductions(declaration, table, &mut resolution);
    match total_income {
        Some(total_income) => {
            resolve_credits(declaration, table, total_income, &eligibility, &mut resolution);
        }
        // Phase-outs need the total, so no credit can be resolved.
        None => resolution.errors.push(ValidationError::new("income", Rule::AmountOutOfRange)),
    }

    debug!(
        declaration = %declaration.id(),
        table = %table.key(),
        deductions = resolution.deductions.len(),
        credits = resolution.credits.len(),
        rejected = resolution.errors.len(),
        "resolved claims"
    );

    Ok(resolution)
}

/// Credit after a phase-out:
/// `max(0, base - rate * max(0, total_income - threshold))`.
///
/// Saturates instead of overflowing, so an absurd income phases the credit
/// out completely.
pub fn phased_credit(
    base: Decimal,
    rule: &CreditRule,
    total_income: Decimal,
) -> Decimal {
    match &rule.phase_out {
        Some(phase_out) => {
            let excess = non_negative(total_income.saturating_sub(phase_out.threshold));
            non_negative(base.saturating_sub(phase_out.rate.saturating_mul(excess)))
        }
        None => base,
    }
}

fn check_partner_references(declaration: &Declaration) -> Result<(), StateError> {
    let content = declaration.content();
    for (i, claim) in content.deductions.iter().enumerate() {
        let Some(reference) = &claim.shared_with else {
            continue;
        };
        let known = content
            .fiscal_partner
            .as_ref()
            .is_some_and(|partner| reference.identifies(partner));
        if !known {
            return Err(StateError::PartnerCrossReference {
                field: format!("deductions[{i}].shared_with"),
                reference: reference.to_string(),
            });
        }
    }
    Ok(())
}

fn resolve_deductions(
    declaration: &Declaration,
    table: &RateTable,
    resolution: &mut Resolution,
) {
    // Ceilings are per type, so several claims of one type share it.
    let mut used: BTreeMap<DeductionType, Decimal> = BTreeMap::new();

    for (i, claim) in declaration.content().deductions.iter().enumerate() {
        let Some(rule) = table.deduction_rule(claim.deduction_type) else {
            resolution.errors.push(ValidationError::new(
                format!("deductions[{i}].deduction_type"),
                Rule::ClaimTypeNotPermitted,
            ));
            continue;
        };
        if claim.shared_with.is_some() && !rule.shareable {
            resolution.errors.push(ValidationError::new(
                format!("deductions[{i}].shared_with"),
                Rule::SharingNotPermitted,
            ));
            continue;
        }

        let used = used.entry(claim.deduction_type).or_default();
        let allowed = match rule.ceiling {
            Some(ceiling) => claim.amount.min(non_negative(ceiling.saturating_sub(*used))),
            None => claim.amount,
        };
        *used = used.saturating_add(allowed);

        resolution.deductions.push(ResolvedDeduction {
            deduction_type: claim.deduction_type,
            claimed: claim.amount,
            allowed,
            capped: allowed < claim.amount,
        });
    }
}

fn resolve_credits(
    declaration: &Declaration,
    table: &RateTable,
    total_income: Decimal,
    eligibility: &Eligibility,
    resolution: &mut Resolution,
) {
    for (i, claim) in declaration.content().credits.iter().enumerate() {
        let Some(rule) = table.credit_rule(claim.credit_type) else {
            resolution.errors.push(ValidationError::new(
                format!("credits[{i}].credit_type"),
                Rule::ClaimTypeNotPermitted,
            ));
            continue;
        };
        if !eligibility.allows(rule) {
            resolution.errors.push(ValidationError::new(
                format!("credits[{i}].credit_type"),
                Rule::CreditNotEligible,
            ));
            continue;
        }

        let base = claim.amount.min(rule.maximum);
        resolution.credits.push(ResolvedCredit {
            credit_type: claim.credit_type,
            base,
            amount: phased_credit(base, rule, total_income),
            automatic: false,
        });
    }

    let claimed: Vec<CreditType> = declaration
        .content()
        .credits
        .iter()
        .map(|claim| claim.credit_type)
        .collect();

    for (credit_type, rule) in table.credit_rules() {
        if !rule.automatic || claimed.contains(credit_type) || !eligibility.allows(rule) {
            continue;
        }
        resolution.credits.push(ResolvedCredit {
            credit_type: *credit_type,
            base: rule.maximum,
            amount: phased_credit(rule.maximum, rule, total_income),
            automatic: true,
        });
    }
}

/// Facts about the taxpayer that credit rules test, taken at the end of the
/// tax year.
struct Eligibility {
    age: Option<u32>,
    youngest_dependent: Option<u32>,
    has_partner: bool,
}

impl Eligibility {
    fn of(declaration: &Declaration) -> Self {
        let content = declaration.content();
        let year_end: Option<NaiveDate> =
            Period::calendar_year(declaration.tax_year()).map(|year| year.end);

        Self {
            age: year_end.map(|end| content.taxpayer.age_on(end)),
            youngest_dependent: year_end.and_then(|end| {
                content
                    .dependents
                    .iter()
                    .map(|dependent| age_on(dependent.date_of_birth, end))
                    .min()
            }),
            has_partner: content.taxpayer.partner.is_some(),
        }
    }

    fn allows(
        &self,
        rule: &CreditRule,
    ) -> bool {
        let old_enough = rule
            .minimum_age
            .is_none_or(|minimum| self.age.is_some_and(|age| age >= minimum));
        let has_dependent = rule
            .dependent_under_age
            .is_none_or(|limit| self.youngest_dependent.is_some_and(|age| age < limit));
        let partner = match rule.partner {
            PartnerRequirement::Any => true,
            PartnerRequirement::WithPartner => self.has_partner,
            PartnerRequirement::WithoutPartner => !self.has_partner,
        };
        old_enough && has_dependent && partner
    }
}
