use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CreditType, DeclarationCategory, DeductionType};
use crate::error::ConfigurationFault;

/// Identifies one published rate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RateTableKey {
    pub tax_year: i32,
    pub category: DeclarationCategory,
}

impl RateTableKey {
    pub fn new(
        tax_year: i32,
        category: DeclarationCategory,
    ) -> Self {
        Self { tax_year, category }
    }
}

impl fmt::Display for RateTableKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}/{}", self.tax_year, self.category)
    }
}

/// One bracket as published: `[lower_bound, upper_bound)` at `rate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketDefinition {
    pub lower_bound: Decimal,
    pub upper_bound: Option<Decimal>,
    pub rate: Decimal,
}

/// A validated bracket. `base_tax` is the tax owed on all income below
/// `lower_bound`, derived when the table is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub lower_bound: Decimal,
    pub upper_bound: Option<Decimal>,
    pub rate: Decimal,
    pub base_tax: Decimal,
}

impl TaxBracket {
    pub fn contains(
        &self,
        income: Decimal,
    ) -> bool {
        income >= self.lower_bound && self.upper_bound.is_none_or(|upper| income < upper)
    }
}

/// Linear reduction of a credit once income exceeds `threshold`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseOut {
    pub threshold: Decimal,
    pub rate: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartnerRequirement {
    #[default]
    Any,
    WithPartner,
    WithoutPartner,
}

impl PartnerRequirement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::WithPartner => "with-partner",
            Self::WithoutPartner => "without-partner",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "any" | "" => Some(Self::Any),
            "with-partner" => Some(Self::WithPartner),
            "without-partner" => Some(Self::WithoutPartner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditRule {
    pub maximum: Decimal,
    #[serde(default)]
    pub phase_out: Option<PhaseOut>,
    /// Granted to every eligible declaration without a claim.
    #[serde(default)]
    pub automatic: bool,
    /// Age the taxpayer must have reached at the end of the tax year.
    #[serde(default)]
    pub minimum_age: Option<u32>,
    /// Requires a dependent younger than this age at the end of the tax year.
    #[serde(default)]
    pub dependent_under_age: Option<u32>,
    #[serde(default)]
    pub partner: PartnerRequirement,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeductionRule {
    #[serde(default)]
    pub ceiling: Option<Decimal>,
    /// Whether the deduction may be split with a fiscal partner.
    #[serde(default)]
    pub shareable: bool,
}

/// Rate table data as supplied by a configuration source, not yet checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTableDefinition {
    pub tax_year: i32,
    pub category: DeclarationCategory,
    pub version: String,
    pub brackets: Vec<BracketDefinition>,
    #[serde(default)]
    pub thresholds: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub credits: BTreeMap<CreditType, CreditRule>,
    #[serde(default)]
    pub deductions: BTreeMap<DeductionType, DeductionRule>,
}

impl RateTableDefinition {
    pub fn key(&self) -> RateTableKey {
        RateTableKey::new(self.tax_year, self.category)
    }
}

/// Brackets, thresholds and claim rules for one `(tax_year, category)`.
///
/// Only constructible through [`TryFrom<RateTableDefinition>`], which
/// guarantees the bracket invariants: the first bracket starts at zero,
/// brackets are contiguous and strictly increasing, and only the last one
/// is open-ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateTable {
    key: RateTableKey,
    version: String,
    brackets: Vec<TaxBracket>,
    thresholds: BTreeMap<String, Decimal>,
    credits: BTreeMap<CreditType, CreditRule>,
    deductions: BTreeMap<DeductionType, DeductionRule>,
}

impl RateTable {
    pub fn key(&self) -> RateTableKey {
        self.key
    }

    pub fn tax_year(&self) -> i32 {
        self.key.tax_year
    }

    pub fn category(&self) -> DeclarationCategory {
        self.key.category
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn brackets(&self) -> &[TaxBracket] {
        &self.brackets
    }

    pub fn threshold(
        &self,
        name: &str,
    ) -> Option<Decimal> {
        self.thresholds.get(name).copied()
    }

    pub fn thresholds(&self) -> &BTreeMap<String, Decimal> {
        &self.thresholds
    }

    pub fn credit_rule(
        &self,
        credit_type: CreditType,
    ) -> Option<&CreditRule> {
        self.credits.get(&credit_type)
    }

    pub fn credit_rules(&self) -> &BTreeMap<CreditType, CreditRule> {
        &self.credits
    }

    pub fn deduction_rule(
        &self,
        deduction_type: DeductionType,
    ) -> Option<&DeductionRule> {
        self.deductions.get(&deduction_type)
    }

    pub fn deduction_rules(&self) -> &BTreeMap<DeductionType, DeductionRule> {
        &self.deductions
    }
}

impl TryFrom<RateTableDefinition> for RateTable {
    type Error = ConfigurationFault;

    fn try_from(definition: RateTableDefinition) -> Result<Self, Self::Error> {
        let key = definition.key();

        if definition.version.trim().is_empty() {
            return Err(ConfigurationFault::MissingVersion { key });
        }

        let brackets = build_brackets(key, &definition.brackets)?;

        for (name, amount) in &definition.thresholds {
            if amount.is_sign_negative() {
                return Err(ConfigurationFault::NegativeAmount {
                    key,
                    item: format!("threshold {name}"),
                });
            }
        }

        for (credit_type, rule) in &definition.credits {
            if rule.maximum.is_sign_negative() {
                return Err(ConfigurationFault::NegativeAmount {
                    key,
                    item: format!("credit {credit_type} maximum"),
                });
            }
            if let Some(phase_out) = &rule.phase_out {
                if phase_out.threshold.is_sign_negative() || !is_rate(phase_out.rate) {
                    return Err(ConfigurationFault::InvalidPhaseOut {
                        key,
                        credit: *credit_type,
                    });
                }
            }
        }

        for (deduction_type, rule) in &definition.deductions {
            if rule.ceiling.is_some_and(|c| c.is_sign_negative()) {
                return Err(ConfigurationFault::NegativeAmount {
                    key,
                    item: format!("deduction {deduction_type} ceiling"),
                });
            }
        }

        Ok(Self {
            key,
            version: definition.version,
            brackets,
            thresholds: definition.thresholds,
            credits: definition.credits,
            deductions: definition.deductions,
        })
    }
}

fn is_rate(rate: Decimal) -> bool {
    rate >= Decimal::ZERO && rate <= Decimal::ONE
}

/// Checks contiguity and derives each bracket's cumulative base tax.
fn build_brackets(
    key: RateTableKey,
    definitions: &[BracketDefinition],
) -> Result<Vec<TaxBracket>, ConfigurationFault> {
    let first = definitions
        .first()
        .ok_or(ConfigurationFault::EmptyBrackets { key })?;
    if !first.lower_bound.is_zero() {
        return Err(ConfigurationFault::FirstBracketNotAtZero {
            key,
            lower_bound: first.lower_bound,
        });
    }

    let last_index = definitions.len() - 1;
    let mut brackets = Vec::with_capacity(definitions.len());
    let mut base_tax = Decimal::ZERO;

    for (index, bracket) in definitions.iter().enumerate() {
        if !is_rate(bracket.rate) {
            return Err(ConfigurationFault::InvalidRate {
                key,
                index,
                rate: bracket.rate,
            });
        }

        match bracket.upper_bound {
            None if index != last_index => {
                return Err(ConfigurationFault::OpenBracketNotLast { key, index });
            }
            Some(_) if index == last_index => {
                return Err(ConfigurationFault::BoundedFinalBracket { key });
            }
            Some(upper) if upper <= bracket.lower_bound => {
                return Err(ConfigurationFault::NotIncreasing { key, index });
            }
            _ => {}
        }

        if let (Some(upper), Some(next)) = (bracket.upper_bound, definitions.get(index + 1)) {
            if next.lower_bound > upper {
                return Err(ConfigurationFault::BracketGap { key, index });
            }
            if next.lower_bound < upper {
                return Err(ConfigurationFault::BracketOverlap { key, index });
            }
        }

        brackets.push(TaxBracket {
            lower_bound: bracket.lower_bound,
            upper_bound: bracket.upper_bound,
            rate: bracket.rate,
            base_tax,
        });

        if let Some(upper) = bracket.upper_bound {
            base_tax += (upper - bracket.lower_bound) * bracket.rate;
        }
    }

    Ok(brackets)
}
