//! Income tax calculation for a validated declaration.
//!
//! # Steps
//!
//! | Step | Amount |
//! |------|--------|
//! | 1 | Gross income per category, summed to total income |
//! | 2 | Taxable income: total income minus allowed deductions, minimum 0 |
//! | 3 | Bracket tax: each bracket taxes `max(0, min(T, upper) - lower) * rate` |
//! | 4 | Tax after credits: bracket tax minus credits, minimum 0 |
//! | 5 | Net amount: tax after credits minus withholding, rounded to cents |
//! | 6 | Collectible amount: net amount, or 0 below the collection thresholds |
//!
//! Steps 1 to 4 are exact; rounding happens once, in step 5.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use rust_decimal_macros::dec;
//! use aangifte_core::calculations::closed_form_tax;
//! use aangifte_core::{BracketDefinition, DeclarationCategory, RateTable, RateTableDefinition};
//!
//! let table = RateTable::try_from(RateTableDefinition {
//!     tax_year: 2024,
//!     category: DeclarationCategory::Resident,
//!     version: "2024.1".to_string(),
//!     brackets: vec![
//!         BracketDefinition {
//!             lower_bound: dec!(0),
//!             upper_bound: Some(dec!(69398)),
//!             rate: dec!(0.3707),
//!         },
//!         BracketDefinition {
//!             lower_bound: dec!(69398),
//!             upper_bound: None,
//!             rate: dec!(0.495),
//!         },
//!     ],
//!     thresholds: BTreeMap::new(),
//!     credits: BTreeMap::new(),
//!     deductions: BTreeMap::new(),
//! })
//! .unwrap();
//!
//! assert_eq!(closed_form_tax(&table, dec!(45000)), dec!(16681.5));
//! assert_eq!(closed_form_tax(&table, dec!(85000)), dec!(33448.8286));
//! ```

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use crate::calculations::common::{non_negative, round_half_up};
use crate::error::StateError;
use crate::models::{
    BracketContribution, CalculationResult, Declaration, IncomeCategory, RateTable,
};
use crate::resolver::Resolution;
use crate::validation::ValidatedDeclaration;

/// Threshold below which owed tax is not collected.
pub const MINIMUM_ASSESSMENT: &str = "minimum_assessment";
/// Threshold below which a refund is not paid.
pub const MINIMUM_REFUND: &str = "minimum_refund";

/// Calculates the outcome of `declaration` under `table` with the resolved
/// claims.
///
/// Claims rejected during resolution contribute nothing; callers are
/// expected to stop on [`Resolution::errors`] before calculating.
///
/// # Errors
///
/// Returns [`StateError::TableMismatch`] if `table` belongs to another year
/// or category than the declaration.
pub fn calculate(
    declaration: ValidatedDeclaration<'_>,
    table: &RateTable,
    resolution: &Resolution,
) -> Result<CalculationResult, StateError> {
    TaxCalculator::new(table).calculate(declaration, resolution)
}

/// Bracket tax on `taxable_income` through the cumulative base tax of the
/// bracket it falls in. Equal to the sum of [`TaxCalculator`]'s per-bracket
/// contributions.
pub fn closed_form_tax(
    table: &RateTable,
    taxable_income: Decimal,
) -> Decimal {
    if taxable_income <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    table
        .brackets()
        .iter()
        .find(|bracket| bracket.contains(taxable_income))
        .map(|bracket| bracket.base_tax + (taxable_income - bracket.lower_bound) * bracket.rate)
        .unwrap_or(Decimal::ZERO)
}

/// Calculator over one rate table.
#[derive(Debug, Clone, Copy)]
pub struct TaxCalculator<'a> {
    table: &'a RateTable,
}

impl<'a> TaxCalculator<'a> {
    pub fn new(table: &'a RateTable) -> Self {
        Self { table }
    }

    pub fn calculate(
        &self,
        validated: ValidatedDeclaration<'_>,
        resolution: &Resolution,
    ) -> Result<CalculationResult, StateError> {
        let declaration = validated.declaration();
        if declaration.rate_table_key() != self.table.key() {
            return Err(StateError::TableMismatch {
                declaration: declaration.rate_table_key(),
                table: self.table.key(),
            });
        }

        let income_by_category = self.income_by_category(declaration);
        let total_income: Decimal = income_by_category.values().copied().sum();

        let total_deductions = resolution.total_deductions();
        let taxable_income = non_negative(total_income - total_deductions);

        let brackets = self.bracket_contributions(taxable_income);
        let tax_before_credits: Decimal = brackets.iter().map(|b| b.tax).sum();

        // Credits can reduce the tax to zero but never below.
        let tax_after_credits = non_negative(tax_before_credits - resolution.total_credits());
        let credits_applied = tax_before_credits - tax_after_credits;

        let withholding: Decimal = declaration
            .content()
            .income
            .iter()
            .map(|record| record.withholding)
            .sum();

        let net_amount = round_half_up(tax_after_credits - withholding);
        let collectible_amount = self.collectible_amount(net_amount);

        debug!(
            declaration = %declaration.id(),
            table = %self.table.key(),
            version = self.table.version(),
            %taxable_income,
            %net_amount,
            "calculated declaration"
        );

        Ok(CalculationResult {
            tax_year: self.table.tax_year(),
            category: self.table.category(),
            rate_table_version: self.table.version().to_string(),
            income_by_category,
            total_income,
            total_deductions,
            taxable_income,
            brackets,
            tax_before_credits,
            credits_applied,
            tax_after_credits,
            withholding,
            net_amount,
            collectible_amount,
        })
    }

    /// Gross income per category.
    fn income_by_category(
        &self,
        declaration: &Declaration,
    ) -> BTreeMap<IncomeCategory, Decimal> {
        let mut totals = BTreeMap::new();
        for record in &declaration.content().income {
            *totals.entry(record.category).or_insert(Decimal::ZERO) += record.gross_amount;
        }
        totals
    }

    /// Walks the brackets, keeping those that tax part of the income.
    fn bracket_contributions(
        &self,
        taxable_income: Decimal,
    ) -> Vec<BracketContribution> {
        self.table
            .brackets()
            .iter()
            .filter_map(|bracket| {
                let ceiling = bracket
                    .upper_bound
                    .map_or(taxable_income, |upper| upper.min(taxable_income));
                let taxable_amount = non_negative(ceiling - bracket.lower_bound);
                if taxable_amount.is_zero() {
                    return None;
                }
                Some(BracketContribution {
                    lower_bound: bracket.lower_bound,
                    upper_bound: bracket.upper_bound,
                    rate: bracket.rate,
                    taxable_amount,
                    tax: taxable_amount * bracket.rate,
                })
            })
            .collect()
    }

    /// Applies the collection thresholds to the rounded net amount.
    fn collectible_amount(
        &self,
        net_amount: Decimal,
    ) -> Decimal {
        let below = |name: &str, amount: Decimal| {
            self.table
                .threshold(name)
                .is_some_and(|threshold| amount < threshold)
        };

        if net_amount > Decimal::ZERO && below(MINIMUM_ASSESSMENT, net_amount) {
            Decimal::ZERO
        } else if net_amount < Decimal::ZERO && below(MINIMUM_REFUND, -net_amount) {
            Decimal::ZERO
        } else {
            net_amount
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::fixtures;
    use crate::models::{CreditClaim, CreditType, DeductionClaim, DeductionType, IncomeRecord};
    use crate::resolver::resolve;
    use crate::validation::validate_declaration;

    fn run(declaration: &Declaration) -> CalculationResult {
        let table = fixtures::table();
        let resolution = resolve(declaration, &table).unwrap();
        let validated = validate_declaration(declaration).unwrap();
        calculate(validated, &table, &resolution).unwrap()
    }

    fn with_income(gross: Decimal) -> CalculationResult {
        run(&fixtures::declaration(gross))
    }

    // =========================================================================
    // worked example tests
    // =========================================================================

    #[test]
    fn income_within_first_bracket() {
        let result = with_income(dec!(45000));

        assert_eq!(result.taxable_income, dec!(45000));
        assert_eq!(result.tax_before_credits, dec!(16681.50));
        assert_eq!(result.net_amount, dec!(16681.50));
        assert_eq!(result.collectible_amount, dec!(16681.50));
        assert_eq!(result.rate_table_version, "2024.1");
    }

    #[test]
    fn income_across_two_brackets() {
        // 69398 * 0.3707 + 15602 * 0.495 = 25725.8386 + 7722.99
        let result = with_income(dec!(85000));

        let contributions: Vec<(Decimal, Decimal)> = result
            .brackets
            .iter()
            .map(|b| (b.taxable_amount, b.tax))
            .collect();
        assert_eq!(
            contributions,
            vec![(dec!(69398), dec!(25725.8386)), (dec!(15602), dec!(7722.99))]
        );
        assert_eq!(result.tax_before_credits, dec!(33448.8286));
        assert_eq!(result.net_amount, dec!(33448.83));
    }

    #[test]
    fn income_at_bracket_boundary_stays_in_lower_rate() {
        let result = with_income(dec!(69398));

        assert_eq!(result.brackets.len(), 1);
        assert_eq!(result.tax_before_credits, dec!(25725.8386));
    }

    #[test]
    fn zero_income_owes_nothing() {
        let result = with_income(dec!(0));

        assert_eq!(result.brackets, Vec::new());
        assert_eq!(result.net_amount, dec!(0));
    }

    // =========================================================================
    // pipeline tests
    // =========================================================================

    #[test]
    fn deductions_credits_and_withholding_flow_through() {
        let mut declaration = fixtures::declaration(dec!(45000));
        declaration
            .edit(|content| {
                content.income[0].withholding = dec!(15000);
                content.income.push(IncomeRecord {
                    category: crate::models::IncomeCategory::Business,
                    gross_amount: dec!(5000),
                    period: fixtures::year(2024),
                    withholding: dec!(0),
                });
                content.deductions.push(DeductionClaim {
                    deduction_type: DeductionType::MortgageInterest,
                    amount: dec!(10000),
                    period: fixtures::year(2024),
                    shared_with: None,
                });
                content.credits.push(CreditClaim {
                    credit_type: CreditType::LabourCredit,
                    amount: dec!(5532),
                    period: fixtures::year(2024),
                });
            })
            .unwrap();

        let result = run(&declaration);

        // labour credit: 5532 - 0.0651 * (50000 - 39957) = 4878.2007
        assert_eq!(result.total_income, dec!(50000));
        assert_eq!(result.income_by_category.len(), 2);
        assert_eq!(result.taxable_income, dec!(40000));
        assert_eq!(result.tax_before_credits, dec!(14828));
        assert_eq!(result.credits_applied, dec!(4878.2007));
        assert_eq!(result.tax_after_credits, dec!(9949.7993));
        assert_eq!(result.net_amount, dec!(-5050.20));
        assert!(result.is_refund());
    }

    #[test]
    fn credits_never_make_tax_negative() {
        let mut declaration = fixtures::declaration(dec!(1000));
        declaration
            .edit(|content| {
                content.credits.push(CreditClaim {
                    credit_type: CreditType::LabourCredit,
                    amount: dec!(5532),
                    period: fixtures::year(2024),
                });
            })
            .unwrap();

        let result = run(&declaration);

        assert_eq!(result.tax_after_credits, dec!(0));
        assert_eq!(result.credits_applied, dec!(370.70));
    }

    #[test]
    fn small_amounts_are_not_collected() {
        // 150 * 0.3707 = 55.605, below the 57 minimum assessment
        let result = with_income(dec!(150));
        assert_eq!(result.net_amount, dec!(55.61));
        assert_eq!(result.collectible_amount, dec!(0));

        // refund of 10.00 is below the 16 minimum refund
        let mut declaration = fixtures::declaration(dec!(100));
        declaration
            .edit(|content| content.income[0].withholding = dec!(47.07))
            .unwrap();
        let result = run(&declaration);
        assert_eq!(result.net_amount, dec!(-10.00));
        assert_eq!(result.collectible_amount, dec!(0));
    }

    #[test]
    fn mismatched_table_is_refused() {
        let declaration = fixtures::declaration(dec!(45000));
        let table = RateTable::try_from(fixtures::definition(
            2025,
            crate::models::DeclarationCategory::Resident,
        ))
        .unwrap();
        let validated = validate_declaration(&declaration).unwrap();

        let err = calculate(validated, &table, &Resolution::default()).unwrap_err();

        assert!(matches!(err, StateError::TableMismatch { .. }));
    }

    // =========================================================================
    // property tests
    // =========================================================================

    #[test]
    fn identical_inputs_give_identical_results() {
        let first = with_income(dec!(85000));
        let second = with_income(dec!(85000));

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn bracket_walk_matches_closed_form() {
        let table = fixtures::table();
        let calculator = TaxCalculator::new(&table);
        for step in 0..400 {
            let income = Decimal::from(step) * dec!(523.37);
            let walked: Decimal = calculator
                .bracket_contributions(income)
                .iter()
                .map(|b| b.tax)
                .sum();
            assert_eq!(walked, closed_form_tax(&table, income), "{income}");
        }
    }

    #[test]
    fn bracket_tax_is_monotonic() {
        let table = fixtures::table();
        let mut previous = Decimal::ZERO;
        for step in 0..400 {
            let income = Decimal::from(step) * dec!(499.99);
            let tax = closed_form_tax(&table, income);
            assert!(tax >= previous, "tax fell at {income}");
            previous = tax;
        }
    }
}
