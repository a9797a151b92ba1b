use std::fmt;

use serde::{Deserialize, Serialize};

use super::{
    CalculationResult, CreditClaim, DeclarationCategory, DeductionClaim, Dependent, IncomeRecord,
    RateTableKey, TaxpayerProfile,
};
use crate::error::StateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclarationId(pub u64);

impl fmt::Display for DeclarationId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Verified-identity assertion handed over by the identity provider.
/// Carried with the declaration, never inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityAssertion(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeclarationStatus {
    #[default]
    Draft,
    Validated,
    Submitted,
    Processing,
    Approved,
    Rejected,
    Amended,
}

impl DeclarationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Validated => "validated",
            Self::Submitted => "submitted",
            Self::Processing => "processing",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Amended => "amended",
        }
    }
}

impl fmt::Display for DeclarationStatus {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a filer may edit while the declaration is editable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationContent {
    pub taxpayer: TaxpayerProfile,
    /// The partner's own profile, present when the partner files along.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_partner: Option<TaxpayerProfile>,
    #[serde(default)]
    pub dependents: Vec<Dependent>,
    #[serde(default)]
    pub income: Vec<IncomeRecord>,
    #[serde(default)]
    pub deductions: Vec<DeductionClaim>,
    #[serde(default)]
    pub credits: Vec<CreditClaim>,
    /// IBAN any refund is paid to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_account: Option<String>,
}

/// For creating new declarations (no id or status)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDeclaration {
    pub tax_year: i32,
    pub category: DeclarationCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityAssertion>,
    pub content: DeclarationContent,
}

/// The `(taxpayer, year, category)` tuple only one live declaration may hold.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FilingKey {
    pub bsn: String,
    pub tax_year: i32,
    pub category: DeclarationCategory,
}

impl fmt::Display for FilingKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}/{}/{}", self.bsn, self.tax_year, self.category)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    id: DeclarationId,
    tax_year: i32,
    category: DeclarationCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identity: Option<IdentityAssertion>,
    content: DeclarationContent,
    status: DeclarationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    calculation: Option<CalculationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    amends: Option<DeclarationId>,
}

impl Declaration {
    /// A fresh draft.
    pub fn new(
        id: DeclarationId,
        new: NewDeclaration,
    ) -> Self {
        Self {
            id,
            tax_year: new.tax_year,
            category: new.category,
            identity: new.identity,
            content: new.content,
            status: DeclarationStatus::Draft,
            calculation: None,
            amends: None,
        }
    }

    /// A draft copying the content of `closed`, linked back to it.
    pub(crate) fn amendment_of(
        id: DeclarationId,
        closed: &Declaration,
    ) -> Self {
        Self {
            id,
            tax_year: closed.tax_year,
            category: closed.category,
            identity: closed.identity.clone(),
            content: closed.content.clone(),
            status: DeclarationStatus::Draft,
            calculation: None,
            amends: Some(closed.id),
        }
    }

    pub fn id(&self) -> DeclarationId {
        self.id
    }

    pub fn tax_year(&self) -> i32 {
        self.tax_year
    }

    pub fn category(&self) -> DeclarationCategory {
        self.category
    }

    pub fn rate_table_key(&self) -> RateTableKey {
        RateTableKey::new(self.tax_year, self.category)
    }

    pub fn identity(&self) -> Option<&IdentityAssertion> {
        self.identity.as_ref()
    }

    pub fn content(&self) -> &DeclarationContent {
        &self.content
    }

    pub fn status(&self) -> DeclarationStatus {
        self.status
    }

    pub fn calculation(&self) -> Option<&CalculationResult> {
        self.calculation.as_ref()
    }

    pub fn amends(&self) -> Option<DeclarationId> {
        self.amends
    }

    pub fn filing_key(&self) -> FilingKey {
        FilingKey {
            bsn: self.content.taxpayer.bsn.trim().to_string(),
            tax_year: self.tax_year,
            category: self.category,
        }
    }

    pub fn is_editable(&self) -> bool {
        matches!(self.status, DeclarationStatus::Draft | DeclarationStatus::Validated)
    }

    /// Applies `edit` to the content.
    ///
    /// Editing a validated declaration sends it back to draft and drops the
    /// attached calculation. The taxpayer's BSN is part of the filing key and
    /// cannot be changed. On error nothing is modified.
    pub fn edit<F>(
        &mut self,
        edit: F,
    ) -> Result<DeclarationStatus, StateError>
    where
        F: FnOnce(&mut DeclarationContent),
    {
        if !self.is_editable() {
            return Err(StateError::NotEditable {
                status: self.status,
            });
        }

        let mut content = self.content.clone();
        edit(&mut content);
        if content.taxpayer.bsn.trim() != self.content.taxpayer.bsn.trim() {
            return Err(StateError::FilingKeyChanged);
        }

        self.content = content;
        self.status = DeclarationStatus::Draft;
        self.calculation = None;
        Ok(self.status)
    }

    pub(crate) fn set_status(
        &mut self,
        status: DeclarationStatus,
    ) {
        self.status = status;
    }

    pub(crate) fn set_calculation(
        &mut self,
        calculation: CalculationResult,
    ) {
        self.calculation = Some(calculation);
    }
}
