use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use super::{bsn, iban, postal_code};
use crate::error::{Rule, ValidationError};
use crate::models::{
    Declaration, DeclarationCategory, PartnerReference, Period, Residency, TaxpayerProfile,
};

/// First year of the current income tax act.
pub const MIN_TAX_YEAR: i32 = 2001;

/// Longest total of income periods a partial-year declaration may cover.
pub const MAX_PARTIAL_YEAR_DAYS: i64 = 366;

const MAX_FOREIGN_TAX_ID_LENGTH: usize = 20;
const MAX_AMOUNT_SCALE: u32 = 2;

/// 999 999 999 999.99
fn max_amount() -> Decimal {
    Decimal::new(99_999_999_999_999, 2)
}

fn earliest_date_of_birth() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1900, 1, 1)
}

/// A declaration that passed [`validate`] without errors.
///
/// The calculation engine only accepts this type, so a calculation can never
/// run on data that has not been validated.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedDeclaration<'a> {
    declaration: &'a Declaration,
}

impl<'a> ValidatedDeclaration<'a> {
    pub fn declaration(&self) -> &'a Declaration {
        self.declaration
    }
}

/// Validates `declaration`, wrapping it when there are no errors.
pub fn validate_declaration(
    declaration: &Declaration,
) -> Result<ValidatedDeclaration<'_>, Vec<ValidationError>> {
    let errors = validate(declaration);
    if errors.is_empty() {
        Ok(ValidatedDeclaration { declaration })
    } else {
        Err(errors)
    }
}

/// Runs every field check, then every cross-field check, and returns all
/// violations found. An empty vector means the declaration is valid.
pub fn validate(declaration: &Declaration) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let content = declaration.content();
    let tax_year = declaration.tax_year();
    let year = Period::calendar_year(tax_year).filter(|_| tax_year >= MIN_TAX_YEAR);

    // Field checks
    if year.is_none() {
        errors.push(ValidationError::new("tax_year", Rule::TaxYearOutOfRange));
    }

    check_profile("taxpayer", &content.taxpayer, year, &mut errors);
    if let Some(partner) = &content.taxpayer.partner {
        check_partner_reference("taxpayer.partner", partner, &content.taxpayer, &mut errors);
    }
    if let Some(partner) = &content.fiscal_partner {
        check_profile("fiscal_partner", partner, year, &mut errors);
    }

    for (i, dependent) in content.dependents.iter().enumerate() {
        check_date_of_birth(
            &format!("dependents[{i}].date_of_birth"),
            dependent.date_of_birth,
            year,
            &mut errors,
        );
    }

    if let Some(account) = &content.refund_account {
        if let Err(rule) = iban::check(account) {
            errors.push(ValidationError::new("refund_account", rule));
        }
    }

    for (i, record) in content.income.iter().enumerate() {
        let path = format!("income[{i}]");
        check_amount(&format!("{path}.gross_amount"), record.gross_amount, &mut errors);
        check_amount(&format!("{path}.withholding"), record.withholding, &mut errors);
        if !record.withholding.is_sign_negative()
            && !record.gross_amount.is_sign_negative()
            && record.withholding > record.gross_amount
        {
            errors.push(ValidationError::new(
                format!("{path}.withholding"),
                Rule::WithholdingExceedsGross,
            ));
        }
        check_period(&format!("{path}.period"), &record.period, year, &mut errors);
    }

    for (i, claim) in content.deductions.iter().enumerate() {
        let path = format!("deductions[{i}]");
        check_amount(&format!("{path}.amount"), claim.amount, &mut errors);
        check_period(&format!("{path}.period"), &claim.period, year, &mut errors);
        if let Some(partner) = &claim.shared_with {
            check_partner_reference(
                &format!("{path}.shared_with"),
                partner,
                &content.taxpayer,
                &mut errors,
            );
        }
    }

    for (i, claim) in content.credits.iter().enumerate() {
        let path = format!("credits[{i}]");
        check_amount(&format!("{path}.amount"), claim.amount, &mut errors);
        check_period(&format!("{path}.period"), &claim.period, year, &mut errors);
    }

    // Structural completeness
    if content.taxpayer.residency == Residency::Resident && content.taxpayer.postal_code.is_none() {
        errors.push(ValidationError::new("taxpayer.postal_code", Rule::Required));
    }

    // Cross-field checks
    check_residency(declaration, &mut errors);
    check_fiscal_partner(declaration, &mut errors);
    check_partial_year(declaration, &mut errors);
    check_duplicate_claims(declaration, &mut errors);

    debug!(
        declaration = %declaration.id(),
        errors = errors.len(),
        "validated declaration"
    );

    errors
}

fn check_profile(
    path: &str,
    profile: &TaxpayerProfile,
    year: Option<Period>,
    errors: &mut Vec<ValidationError>,
) {
    // A partner living abroad may be known by a foreign identifier only.
    let foreign_only = profile.bsn.trim().is_empty() && profile.foreign_tax_id.is_some();
    if !foreign_only {
        if let Err(rule) = bsn::check(profile.bsn.trim()) {
            errors.push(ValidationError::new(format!("{path}.bsn"), rule));
        }
    }

    if let Some(id) = &profile.foreign_tax_id {
        if !is_foreign_tax_id(id) {
            errors.push(ValidationError::new(
                format!("{path}.foreign_tax_id"),
                Rule::ForeignTaxIdFormat,
            ));
        }
    }

    check_date_of_birth(&format!("{path}.date_of_birth"), profile.date_of_birth, year, errors);

    if let Some(code) = &profile.postal_code {
        if let Err(rule) = postal_code::check(code) {
            errors.push(ValidationError::new(format!("{path}.postal_code"), rule));
        }
    }
}

fn check_partner_reference(
    path: &str,
    reference: &PartnerReference,
    taxpayer: &TaxpayerProfile,
    errors: &mut Vec<ValidationError>,
) {
    match reference {
        PartnerReference::Bsn(partner_bsn) => {
            if let Err(rule) = bsn::check(partner_bsn.trim()) {
                errors.push(ValidationError::new(path, rule));
            } else if partner_bsn.trim() == taxpayer.bsn.trim() {
                errors.push(ValidationError::new(path, Rule::PartnerIsTaxpayer));
            }
        }
        PartnerReference::ForeignTaxId(id) => {
            if !is_foreign_tax_id(id) {
                errors.push(ValidationError::new(path, Rule::ForeignTaxIdFormat));
            }
        }
    }
}

fn is_foreign_tax_id(id: &str) -> bool {
    let id = id.trim();
    !id.is_empty()
        && id.len() <= MAX_FOREIGN_TAX_ID_LENGTH
        && id.chars().all(|c| c.is_ascii_alphanumeric())
}

fn check_date_of_birth(
    path: &str,
    date_of_birth: NaiveDate,
    year: Option<Period>,
    errors: &mut Vec<ValidationError>,
) {
    let too_early = earliest_date_of_birth().is_some_and(|earliest| date_of_birth < earliest);
    let too_late = year.is_some_and(|year| date_of_birth > year.end);
    if too_early || too_late {
        errors.push(ValidationError::new(path, Rule::DateOfBirthOutOfRange));
    }
}

fn check_amount(
    path: &str,
    amount: Decimal,
    errors: &mut Vec<ValidationError>,
) {
    if amount.is_sign_negative() && !amount.is_zero() {
        errors.push(ValidationError::new(path, Rule::NegativeAmount));
    }
    if amount.abs() > max_amount() {
        errors.push(ValidationError::new(path, Rule::AmountOutOfRange));
    }
    if amount.normalize().scale() > MAX_AMOUNT_SCALE {
        errors.push(ValidationError::new(path, Rule::AmountPrecision));
    }
}

fn check_period(
    path: &str,
    period: &Period,
    year: Option<Period>,
    errors: &mut Vec<ValidationError>,
) {
    if period.is_reversed() {
        errors.push(ValidationError::new(path, Rule::PeriodReversed));
    } else if year.is_some_and(|year| !year.contains(period)) {
        errors.push(ValidationError::new(path, Rule::PeriodOutsideTaxYear));
    }
}

fn check_residency(
    declaration: &Declaration,
    errors: &mut Vec<ValidationError>,
) {
    let residency = declaration.content().taxpayer.residency;
    if residency != declaration.category().required_residency() {
        errors.push(ValidationError::new("category", Rule::ResidencyMismatch));
    }
}

fn check_fiscal_partner(
    declaration: &Declaration,
    errors: &mut Vec<ValidationError>,
) {
    let content = declaration.content();
    let Some(partner) = &content.fiscal_partner else {
        return;
    };
    let matches = content
        .taxpayer
        .partner
        .as_ref()
        .is_some_and(|reference| reference.identifies(partner));
    if !matches {
        errors.push(ValidationError::new("fiscal_partner", Rule::PartnerProfileMismatch));
    }
}

fn check_partial_year(
    declaration: &Declaration,
    errors: &mut Vec<ValidationError>,
) {
    if declaration.category() != DeclarationCategory::Migration {
        return;
    }
    let days: i64 = declaration
        .content()
        .income
        .iter()
        .map(|record| record.period.days())
        .sum();
    if days > MAX_PARTIAL_YEAR_DAYS {
        errors.push(ValidationError::new("income", Rule::PartialYearDaysExceeded));
    }
}

fn check_duplicate_claims(
    declaration: &Declaration,
    errors: &mut Vec<ValidationError>,
) {
    let content = declaration.content();

    for (j, later) in content.deductions.iter().enumerate() {
        let duplicate = content.deductions[..j].iter().any(|earlier| {
            earlier.deduction_type == later.deduction_type && earlier.period.overlaps(&later.period)
        });
        if duplicate {
            errors.push(ValidationError::new(format!("deductions[{j}]"), Rule::DuplicateClaim));
        }
    }

    for (j, later) in content.credits.iter().enumerate() {
        let duplicate = content.credits[..j].iter().any(|earlier| {
            earlier.credit_type == later.credit_type && earlier.period.overlaps(&later.period)
        });
        if duplicate {
            errors.push(ValidationError::new(format!("credits[{j}]"), Rule::DuplicateClaim));
        }
    }
}
