use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Period, PartnerReference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeductionType {
    MortgageInterest,
    DependentCare,
    SpecificCareCosts,
    Gifts,
    Alimony,
}

impl DeductionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MortgageInterest => "mortgage-interest",
            Self::DependentCare => "dependent-care",
            Self::SpecificCareCosts => "specific-care-costs",
            Self::Gifts => "gifts",
            Self::Alimony => "alimony",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mortgage-interest" => Some(Self::MortgageInterest),
            "dependent-care" => Some(Self::DependentCare),
            "specific-care-costs" => Some(Self::SpecificCareCosts),
            "gifts" => Some(Self::Gifts),
            "alimony" => Some(Self::Alimony),
            _ => None,
        }
    }
}

impl fmt::Display for DeductionType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreditType {
    GeneralTaxCredit,
    LabourCredit,
    IncomeDependentCombinationCredit,
    ElderlyCredit,
    SingleElderlyCredit,
}

impl CreditType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeneralTaxCredit => "general-tax-credit",
            Self::LabourCredit => "labour-credit",
            Self::IncomeDependentCombinationCredit => "income-dependent-combination-credit",
            Self::ElderlyCredit => "elderly-credit",
            Self::SingleElderlyCredit => "single-elderly-credit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "general-tax-credit" => Some(Self::GeneralTaxCredit),
            "labour-credit" => Some(Self::LabourCredit),
            "income-dependent-combination-credit" => Some(Self::IncomeDependentCombinationCredit),
            "elderly-credit" => Some(Self::ElderlyCredit),
            "single-elderly-credit" => Some(Self::SingleElderlyCredit),
            _ => None,
        }
    }
}

impl fmt::Display for CreditType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionClaim {
    pub deduction_type: DeductionType,
    pub amount: Decimal,
    pub period: Period,
    /// Set when the deduction is split with the fiscal partner
    /// (e.g. a jointly owned home's mortgage interest).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_with: Option<PartnerReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditClaim {
    pub credit_type: CreditType,
    pub amount: Decimal,
    pub period: Period,
}

/// A deduction claim that passed eligibility and was capped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDeduction {
    pub deduction_type: DeductionType,
    pub claimed: Decimal,
    pub allowed: Decimal,
    pub capped: bool,
}

/// A credit after capping and phase-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCredit {
    pub credit_type: CreditType,
    /// Amount before phase-out (claimed amount capped at the table maximum).
    pub base: Decimal,
    pub amount: Decimal,
    /// True when the credit was granted from the rate table without a claim.
    pub automatic: bool,
}
