use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of declaration being filed.
///
/// Every category runs through the same pipeline; they differ only in the
/// rate table (and therefore the permitted claim types) they resolve against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeclarationCategory {
    Resident,
    NonResident,
    Migration,
    ProvisionalResident,
    ProvisionalNonResident,
}

impl DeclarationCategory {
    pub const ALL: [DeclarationCategory; 5] = [
        Self::Resident,
        Self::NonResident,
        Self::Migration,
        Self::ProvisionalResident,
        Self::ProvisionalNonResident,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resident => "resident",
            Self::NonResident => "non-resident",
            Self::Migration => "migration",
            Self::ProvisionalResident => "provisional-resident",
            Self::ProvisionalNonResident => "provisional-non-resident",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "resident" => Some(Self::Resident),
            "non-resident" => Some(Self::NonResident),
            "migration" => Some(Self::Migration),
            "provisional-resident" => Some(Self::ProvisionalResident),
            "provisional-non-resident" => Some(Self::ProvisionalNonResident),
            _ => None,
        }
    }

    /// The residency a taxpayer must have to file in this category.
    pub fn required_residency(&self) -> Residency {
        match self {
            Self::Resident | Self::ProvisionalResident => Residency::Resident,
            Self::NonResident | Self::ProvisionalNonResident => Residency::NonResident,
            Self::Migration => Residency::PartialYear,
        }
    }
}

impl fmt::Display for DeclarationCategory {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Residency {
    Resident,
    NonResident,
    /// Migrated into or out of the Netherlands during the tax year.
    PartialYear,
}

impl Residency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resident => "resident",
            Self::NonResident => "non-resident",
            Self::PartialYear => "partial-year",
        }
    }
}

impl fmt::Display for Residency {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncomeCategory {
    Employment,
    InvestmentActualReturn,
    Business,
    Foreign,
}

impl IncomeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employment => "employment",
            Self::InvestmentActualReturn => "investment-actual-return",
            Self::Business => "business",
            Self::Foreign => "foreign",
        }
    }
}

impl fmt::Display for IncomeCategory {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
