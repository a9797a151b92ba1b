use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{IncomeCategory, Period};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeRecord {
    pub category: IncomeCategory,
    pub gross_amount: Decimal,
    pub period: Period,
    /// Tax already withheld at source (e.g. payroll tax).
    #[serde(default)]
    pub withholding: Decimal,
}
