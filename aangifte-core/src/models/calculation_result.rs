use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{DeclarationCategory, IncomeCategory};

/// Tax contributed by one bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketContribution {
    pub lower_bound: Decimal,
    pub upper_bound: Option<Decimal>,
    pub rate: Decimal,
    /// Part of the taxable income falling inside this bracket.
    pub taxable_amount: Decimal,
    pub tax: Decimal,
}

/// Outcome of a calculation.
///
/// Intermediate amounts are exact; only `net_amount` and
/// `collectible_amount` are rounded to cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub tax_year: i32,
    pub category: DeclarationCategory,
    /// Version of the rate table used, for reproducing the result.
    pub rate_table_version: String,

    pub income_by_category: BTreeMap<IncomeCategory, Decimal>,
    pub total_income: Decimal,
    pub total_deductions: Decimal,
    pub taxable_income: Decimal,

    pub brackets: Vec<BracketContribution>,
    pub tax_before_credits: Decimal,
    pub credits_applied: Decimal,
    pub tax_after_credits: Decimal,

    pub withholding: Decimal,
    /// Positive when tax is owed, negative when refundable.
    pub net_amount: Decimal,
    /// `net_amount`, or zero when it falls below the collection thresholds.
    pub collectible_amount: Decimal,
}

impl CalculationResult {
    pub fn is_refund(&self) -> bool {
        self.net_amount.is_sign_negative() && !self.net_amount.is_zero()
    }
}
