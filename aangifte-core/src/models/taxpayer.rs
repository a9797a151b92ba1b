use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::Residency;

/// Identifies a fiscal partner. A partner is known either by BSN or, when
/// they have none, by a foreign tax identifier; never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartnerReference {
    Bsn(String),
    ForeignTaxId(String),
}

impl PartnerReference {
    /// Whether `profile` is the person this reference points at.
    pub fn identifies(
        &self,
        profile: &TaxpayerProfile,
    ) -> bool {
        match self {
            Self::Bsn(bsn) => profile.bsn.trim() == bsn.trim(),
            Self::ForeignTaxId(id) => profile
                .foreign_tax_id
                .as_deref()
                .is_some_and(|own| own.trim() == id.trim()),
        }
    }
}

impl fmt::Display for PartnerReference {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Bsn(bsn) => write!(f, "bsn:{bsn}"),
            Self::ForeignTaxId(id) => write!(f, "foreign:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxpayerProfile {
    pub bsn: String,
    pub residency: Residency,
    pub date_of_birth: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner: Option<PartnerReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// Only used to identify a partner without a BSN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_tax_id: Option<String>,
}

impl TaxpayerProfile {
    /// Age in whole years on `date`.
    pub fn age_on(
        &self,
        date: NaiveDate,
    ) -> u32 {
        age_on(self.date_of_birth, date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependent {
    pub date_of_birth: NaiveDate,
}

/// Age in whole years reached on `date`; zero when born after `date`.
pub fn age_on(
    date_of_birth: NaiveDate,
    date: NaiveDate,
) -> u32 {
    if date < date_of_birth {
        return 0;
    }
    let mut years = date.year() - date_of_birth.year();
    if (date.month(), date.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    u32::try_from(years).unwrap_or(0)
}
