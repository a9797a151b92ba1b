mod calculation_result;
mod category;
mod claims;
mod declaration;
mod income;
mod period;
mod rate_table;
mod taxpayer;

pub use calculation_result::{BracketContribution, CalculationResult};
pub use category::{DeclarationCategory, IncomeCategory, Residency};
pub use claims::{
    CreditClaim, CreditType, DeductionClaim, DeductionType, ResolvedCredit, ResolvedDeduction,
};
pub use declaration::{
    Declaration, DeclarationContent, DeclarationId, DeclarationStatus, FilingKey,
    IdentityAssertion, NewDeclaration,
};
pub use income::IncomeRecord;
pub use period::Period;
pub use rate_table::{
    BracketDefinition, CreditRule, DeductionRule, PartnerRequirement, PhaseOut, RateTable,
    RateTableDefinition, RateTableKey, TaxBracket,
};
pub use taxpayer::{Dependent, PartnerReference, TaxpayerProfile, age_on};
