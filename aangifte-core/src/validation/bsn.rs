//! Citizen-service number (BSN) checks.
//!
//! A BSN has nine digits. The first eight are weighted 9 down to 2, the
//! ninth is subtracted, and the total must be divisible by 11 (the
//! "elfproef"). Numbers whose eight weighted digits are all the same
//! (`000000000`, `111111110`, ...) are never issued and are rejected even
//! when the arithmetic works out.

use crate::error::Rule;

const LENGTH: usize = 9;

/// Checks `bsn`, returning the first rule it breaks.
///
/// # Examples
///
/// ```
/// use aangifte_core::error::Rule;
/// use aangifte_core::validation::bsn;
///
/// assert_eq!(bsn::check("123456782"), Ok(()));
/// assert_eq!(bsn::check("123456789"), Err(Rule::BsnChecksum));
/// assert_eq!(bsn::check("111111110"), Err(Rule::BsnRepeatedDigits));
/// assert_eq!(bsn::check("12345678"), Err(Rule::BsnFormat));
/// ```
pub fn check(bsn: &str) -> Result<(), Rule> {
    let digits = bsn
        .chars()
        .map(|c| c.to_digit(10))
        .collect::<Option<Vec<u32>>>()
        .ok_or(Rule::BsnFormat)?;

    if digits.len() != LENGTH {
        return Err(Rule::BsnFormat);
    }

    let (weighted, last) = digits.split_at(LENGTH - 1);
    if weighted.iter().all(|d| *d == weighted[0]) {
        return Err(Rule::BsnRepeatedDigits);
    }

    if checksum(weighted, last[0]).rem_euclid(11) != 0 {
        return Err(Rule::BsnChecksum);
    }

    Ok(())
}

pub fn is_valid(bsn: &str) -> bool {
    check(bsn).is_ok()
}

/// Weighted sum of the first eight digits minus the last one.
fn checksum(
    weighted: &[u32],
    last: u32,
) -> i64 {
    let sum: u32 = weighted
        .iter()
        .zip((2..=9).rev())
        .map(|(digit, weight)| digit * weight)
        .sum();
    i64::from(sum) - i64::from(last)
}
