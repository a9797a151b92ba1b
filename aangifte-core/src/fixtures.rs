//! Shared declarations and rate tables for unit tests.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::{
    BracketDefinition, CreditRule, CreditType, Declaration, DeclarationCategory,
    DeclarationContent, DeclarationId, DeductionRule, DeductionType, IncomeCategory, IncomeRecord,
    NewDeclaration, PartnerReference, PartnerRequirement, Period, PhaseOut, RateTable,
    RateTableDefinition, Residency, TaxpayerProfile,
};

pub const TAXPAYER_BSN: &str = "123456782";
pub const PARTNER_BSN: &str = "111222333";

pub fn date(
    y: i32,
    m: u32,
    d: u32,
) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn year(tax_year: i32) -> Period {
    Period::calendar_year(tax_year).unwrap()
}

pub fn taxpayer() -> TaxpayerProfile {
    TaxpayerProfile {
        bsn: TAXPAYER_BSN.to_string(),
        residency: Residency::Resident,
        date_of_birth: date(1980, 5, 1),
        partner: None,
        postal_code: Some("1234 AB".to_string()),
        foreign_tax_id: None,
    }
}

pub fn partner() -> TaxpayerProfile {
    TaxpayerProfile {
        bsn: PARTNER_BSN.to_string(),
        residency: Residency::Resident,
        date_of_birth: date(1982, 9, 12),
        partner: Some(PartnerReference::Bsn(TAXPAYER_BSN.to_string())),
        postal_code: Some("1234 AB".to_string()),
        foreign_tax_id: None,
    }
}

pub fn employment(gross: Decimal) -> IncomeRecord {
    IncomeRecord {
        category: IncomeCategory::Employment,
        gross_amount: gross,
        period: year(2024),
        withholding: Decimal::ZERO,
    }
}

/// A valid 2024 resident declaration with the given employment income.
pub fn declaration(gross: Decimal) -> Declaration {
    Declaration::new(
        DeclarationId(1),
        NewDeclaration {
            tax_year: 2024,
            category: DeclarationCategory::Resident,
            identity: None,
            content: DeclarationContent {
                taxpayer: taxpayer(),
                fiscal_partner: None,
                dependents: Vec::new(),
                income: vec![employment(gross)],
                deductions: Vec::new(),
                credits: Vec::new(),
                refund_account: Some("NL91ABNA0417164300".to_string()),
            },
        },
    )
}

/// The same declaration with a fiscal partner attached on both sides.
pub fn declaration_with_partner(gross: Decimal) -> Declaration {
    let mut declaration = declaration(gross);
    declaration
        .edit(|content| {
            content.taxpayer.partner = Some(PartnerReference::Bsn(PARTNER_BSN.to_string()));
            content.fiscal_partner = Some(partner());
        })
        .unwrap();
    declaration
}

/// Two brackets, 37.07% up to 69 398 and 49.5% above, and no automatic
/// credits, so bracket tax flows through unchanged.
pub fn definition(
    tax_year: i32,
    category: DeclarationCategory,
) -> RateTableDefinition {
    let mut credits = BTreeMap::new();
    credits.insert(
        CreditType::LabourCredit,
        CreditRule {
            maximum: dec!(5532),
            phase_out: Some(PhaseOut {
                threshold: dec!(39957),
                rate: dec!(0.0651),
            }),
            automatic: false,
            minimum_age: None,
            dependent_under_age: None,
            partner: PartnerRequirement::Any,
        },
    );
    credits.insert(
        CreditType::ElderlyCredit,
        CreditRule {
            maximum: dec!(2010),
            phase_out: None,
            automatic: false,
            minimum_age: Some(67),
            dependent_under_age: None,
            partner: PartnerRequirement::Any,
        },
    );
    credits.insert(
        CreditType::IncomeDependentCombinationCredit,
        CreditRule {
            maximum: dec!(2950),
            phase_out: None,
            automatic: false,
            minimum_age: None,
            dependent_under_age: Some(12),
            partner: PartnerRequirement::Any,
        },
    );
    credits.insert(
        CreditType::SingleElderlyCredit,
        CreditRule {
            maximum: dec!(524),
            phase_out: None,
            automatic: false,
            minimum_age: Some(67),
            dependent_under_age: None,
            partner: PartnerRequirement::WithoutPartner,
        },
    );

    let mut deductions = BTreeMap::new();
    deductions.insert(
        DeductionType::MortgageInterest,
        DeductionRule {
            ceiling: None,
            shareable: true,
        },
    );
    deductions.insert(
        DeductionType::Gifts,
        DeductionRule {
            ceiling: Some(dec!(1000)),
            shareable: false,
        },
    );
    if category == DeclarationCategory::Resident {
        deductions.insert(DeductionType::DependentCare, DeductionRule::default());
    }

    let mut thresholds = BTreeMap::new();
    thresholds.insert("minimum_assessment".to_string(), dec!(57));
    thresholds.insert("minimum_refund".to_string(), dec!(16));

    RateTableDefinition {
        tax_year,
        category,
        version: format!("{tax_year}.1"),
        brackets: vec![
            BracketDefinition {
                lower_bound: dec!(0),
                upper_bound: Some(dec!(69398)),
                rate: dec!(0.3707),
            },
            BracketDefinition {
                lower_bound: dec!(69398),
                upper_bound: None,
                rate: dec!(0.495),
            },
        ],
        thresholds,
        credits,
        deductions,
    }
}

pub fn table() -> RateTable {
    RateTable::try_from(definition(2024, DeclarationCategory::Resident)).unwrap()
}
