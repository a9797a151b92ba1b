//! Field and cross-field validation of declarations.

pub mod bsn;
mod declaration;
pub mod iban;
pub mod postal_code;

pub use declaration::{
    MAX_PARTIAL_YEAR_DAYS, MIN_TAX_YEAR, ValidatedDeclaration, validate, validate_declaration,
};
