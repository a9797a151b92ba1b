//! Dutch postal code checks.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::Rule;

static POSTAL_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[1-9][0-9]{3} ?([A-Z]{2})$").expect("postal code pattern is valid")
});

/// Letter pairs never issued.
const RESERVED_LETTERS: [&str; 3] = ["SA", "SD", "SS"];

/// Checks a postal code of the form `1234 AB` (the space is optional,
/// letters may be lower case).
pub fn check(postal_code: &str) -> Result<(), Rule> {
    let upper = postal_code.trim().to_ascii_uppercase();
    let captures = POSTAL_CODE_RE
        .captures(&upper)
        .ok_or(Rule::PostalCodeFormat)?;

    if RESERVED_LETTERS.contains(&&captures[1]) {
        return Err(Rule::PostalCodeFormat);
    }

    Ok(())
}
