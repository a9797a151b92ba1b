//! Income tax calculation.

pub mod common;
mod engine;

pub use engine::{MINIMUM_ASSESSMENT, MINIMUM_REFUND, TaxCalculator, calculate, closed_form_tax};
