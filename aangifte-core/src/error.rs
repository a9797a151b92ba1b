//! Error kinds shared across the crate.
//!
//! There are three disjoint kinds:
//!
//! | Kind | Meaning | Recovery |
//! |------|---------|----------|
//! | [`ValidationError`] | problem in the filer's data | correct and resubmit |
//! | [`ConfigurationFault`] | structurally invalid rate table | fix the deployment |
//! | [`StateError`] | caller or protocol misuse | fix the caller |
//!
//! [`FilingError`] wraps all three (plus registry lookups) for the filing
//! pipeline.
//!
//! Validation errors are always reported as a complete set. Each carries a
//! stable code (see [`Rule::code`]) so it can be rendered without the core
//! knowing about presentation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{CreditType, DeclarationId, DeclarationStatus, FilingKey, RateTableKey};
use crate::registry::RegistryError;

/// A single rule a field can violate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rule {
    #[error("a value is required")]
    Required,
    #[error("BSN must be exactly 9 digits")]
    BsnFormat,
    #[error("BSN fails the modulus-11 check")]
    BsnChecksum,
    #[error("BSN consists of repeated digits")]
    BsnRepeatedDigits,
    #[error("IBAN is malformed")]
    IbanFormat,
    #[error("IBAN check digits are wrong")]
    IbanChecksum,
    #[error("postal code must look like '1234 AB'")]
    PostalCodeFormat,
    #[error("foreign tax identifier must be 1 to 20 letters or digits")]
    ForeignTaxIdFormat,
    #[error("amount may not be negative")]
    NegativeAmount,
    #[error("amount has more than two decimals")]
    AmountPrecision,
    #[error("amount is out of range")]
    AmountOutOfRange,
    #[error("withholding exceeds the gross amount")]
    WithholdingExceedsGross,
    #[error("period ends before it starts")]
    PeriodReversed,
    #[error("period falls outside the tax year")]
    PeriodOutsideTaxYear,
    #[error("date of birth is out of range")]
    DateOfBirthOutOfRange,
    #[error("tax year is not supported")]
    TaxYearOutOfRange,
    #[error("partner is the taxpayer")]
    PartnerIsTaxpayer,
    #[error("fiscal partner profile does not match the partner reference")]
    PartnerProfileMismatch,
    #[error("declaration category does not match the taxpayer's residency")]
    ResidencyMismatch,
    #[error("partial-year income periods exceed 366 days")]
    PartialYearDaysExceeded,
    #[error("claim of this type already made for an overlapping period")]
    DuplicateClaim,
    #[error("claim type is not permitted for this year and category")]
    ClaimTypeNotPermitted,
    #[error("taxpayer is not eligible for this credit")]
    CreditNotEligible,
    #[error("claim may not be shared with a partner")]
    SharingNotPermitted,
}

impl Rule {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Required => "REQUIRED",
            Self::BsnFormat => "BSN_FORMAT",
            Self::BsnChecksum => "BSN_CHECKSUM",
            Self::BsnRepeatedDigits => "BSN_REPEATED_DIGITS",
            Self::IbanFormat => "IBAN_FORMAT",
            Self::IbanChecksum => "IBAN_CHECKSUM",
            Self::PostalCodeFormat => "POSTAL_CODE_FORMAT",
            Self::ForeignTaxIdFormat => "FOREIGN_TAX_ID_FORMAT",
            Self::NegativeAmount => "NEGATIVE_AMOUNT",
            Self::AmountPrecision => "AMOUNT_PRECISION",
            Self::AmountOutOfRange => "AMOUNT_OUT_OF_RANGE",
            Self::WithholdingExceedsGross => "WITHHOLDING_EXCEEDS_GROSS",
            Self::PeriodReversed => "PERIOD_REVERSED",
            Self::PeriodOutsideTaxYear => "PERIOD_OUTSIDE_TAX_YEAR",
            Self::DateOfBirthOutOfRange => "DATE_OF_BIRTH_OUT_OF_RANGE",
            Self::TaxYearOutOfRange => "TAX_YEAR_OUT_OF_RANGE",
            Self::PartnerIsTaxpayer => "PARTNER_IS_TAXPAYER",
            Self::PartnerProfileMismatch => "PARTNER_PROFILE_MISMATCH",
            Self::ResidencyMismatch => "RESIDENCY_MISMATCH",
            Self::PartialYearDaysExceeded => "PARTIAL_YEAR_DAYS_EXCEEDED",
            Self::DuplicateClaim => "DUPLICATE_CLAIM",
            Self::ClaimTypeNotPermitted => "CLAIM_TYPE_NOT_PERMITTED",
            Self::CreditNotEligible => "CREDIT_NOT_ELIGIBLE",
            Self::SharingNotPermitted => "SHARING_NOT_PERMITTED",
        }
    }
}

/// A problem with the filer's data at `field` (e.g. `income[1].period.end`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[error("{field}: {rule}")]
pub struct ValidationError {
    pub field: String,
    pub rule: Rule,
}

impl ValidationError {
    pub fn new(
        field: impl Into<String>,
        rule: Rule,
    ) -> Self {
        Self {
            field: field.into(),
            rule,
        }
    }

    pub fn code(&self) -> &'static str {
        self.rule.code()
    }
}

/// A rate table that is structurally unusable.
///
/// Distinct from a table that simply has not been published yet; see
/// [`crate::registry::RegistryError::NotFound`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationFault {
    #[error("rate table {key} has no version")]
    MissingVersion { key: RateTableKey },

    #[error("rate table {key} has no brackets")]
    EmptyBrackets { key: RateTableKey },

    #[error("rate table {key}: first bracket starts at {lower_bound} instead of 0")]
    FirstBracketNotAtZero {
        key: RateTableKey,
        lower_bound: Decimal,
    },

    #[error("rate table {key}: bracket {index} has invalid rate {rate}")]
    InvalidRate {
        key: RateTableKey,
        index: usize,
        rate: Decimal,
    },

    #[error("rate table {key}: bracket {index} is open-ended but not last")]
    OpenBracketNotLast { key: RateTableKey, index: usize },

    #[error("rate table {key}: final bracket must be open-ended")]
    BoundedFinalBracket { key: RateTableKey },

    #[error("rate table {key}: bracket {index} upper bound does not exceed its lower bound")]
    NotIncreasing { key: RateTableKey, index: usize },

    #[error("rate table {key}: gap after bracket {index}")]
    BracketGap { key: RateTableKey, index: usize },

    #[error("rate table {key}: bracket {index} overlaps the next one")]
    BracketOverlap { key: RateTableKey, index: usize },

    #[error("rate table {key}: negative {item}")]
    NegativeAmount { key: RateTableKey, item: String },

    #[error("rate table {key}: invalid phase-out for {credit}")]
    InvalidPhaseOut {
        key: RateTableKey,
        credit: CreditType,
    },

    #[error("rate table {key} is defined more than once")]
    DuplicateTable { key: RateTableKey },

    #[error("rate table {key} lists {item} more than once")]
    DuplicateEntry { key: RateTableKey, item: String },

    #[error("rate table {key}: {detail}")]
    MalformedEntry { key: RateTableKey, detail: String },
}

impl ConfigurationFault {
    /// The table the fault belongs to.
    pub fn key(&self) -> RateTableKey {
        match self {
            Self::MissingVersion { key }
            | Self::EmptyBrackets { key }
            | Self::FirstBracketNotAtZero { key, .. }
            | Self::InvalidRate { key, .. }
            | Self::OpenBracketNotLast { key, .. }
            | Self::BoundedFinalBracket { key }
            | Self::NotIncreasing { key, .. }
            | Self::BracketGap { key, .. }
            | Self::BracketOverlap { key, .. }
            | Self::NegativeAmount { key, .. }
            | Self::InvalidPhaseOut { key, .. }
            | Self::DuplicateTable { key }
            | Self::DuplicateEntry { key, .. }
            | Self::MalformedEntry { key, .. } => *key,
        }
    }
}

/// Misuse of the declaration protocol. Never leaves a declaration modified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("cannot move declaration from {from} to {to}")]
    InvalidTransition {
        from: DeclarationStatus,
        to: DeclarationStatus,
    },

    #[error("declaration is {status} and can no longer be edited")]
    NotEditable { status: DeclarationStatus },

    #[error("the taxpayer's BSN identifies the filing and cannot be edited")]
    FilingKeyChanged,

    #[error("declaration has no calculation attached")]
    CalculationMissing,

    #[error("{field} references partner {reference} who is not part of this filing")]
    PartnerCrossReference { field: String, reference: String },

    #[error("declaration needs rate table {declaration} but was given {table}")]
    TableMismatch {
        declaration: RateTableKey,
        table: RateTableKey,
    },

    #[error("{key} is already being filed as declaration {existing}")]
    DuplicateFiling {
        key: FilingKey,
        existing: DeclarationId,
    },

    #[error("declaration {0} does not exist")]
    UnknownDeclaration(DeclarationId),
}

/// Anything that stops a declaration from moving forward in the filing
/// pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilingError {
    #[error("declaration has {} validation error(s)", .0.len())]
    Invalid(Vec<ValidationError>),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl FilingError {
    /// The validation errors, when that is what stopped the declaration.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            Self::Invalid(errors) => errors,
            _ => &[],
        }
    }
}
