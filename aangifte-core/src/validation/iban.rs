//! Bank account (IBAN) checks, ISO 13616.

use crate::error::Rule;

const MIN_LENGTH: usize = 15;
const MAX_LENGTH: usize = 34;
const NL_LENGTH: usize = 18;

/// Removes spaces and upper-cases, the form IBANs are compared in.
pub fn normalize(iban: &str) -> String {
    iban.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Checks the structure and the mod-97 check digits of `iban`.
///
/// Dutch IBANs must additionally have the `NLkk BBBB 0123456789` shape.
pub fn check(iban: &str) -> Result<(), Rule> {
    let iban = normalize(iban);
    let bytes = iban.as_bytes();

    if !(MIN_LENGTH..=MAX_LENGTH).contains(&bytes.len())
        || !bytes.iter().all(u8::is_ascii_alphanumeric)
        || !bytes[..2].iter().all(u8::is_ascii_alphabetic)
        || !bytes[2..4].iter().all(u8::is_ascii_digit)
    {
        return Err(Rule::IbanFormat);
    }

    if &iban[..2] == "NL"
        && (bytes.len() != NL_LENGTH
            || !bytes[4..8].iter().all(u8::is_ascii_alphabetic)
            || !bytes[8..].iter().all(u8::is_ascii_digit))
    {
        return Err(Rule::IbanFormat);
    }

    if mod97(&iban) != 1 {
        return Err(Rule::IbanChecksum);
    }

    Ok(())
}

/// Remainder of the rearranged IBAN (country and check digits moved to the
/// end, letters expanded to 10..35) modulo 97, computed piecewise.
fn mod97(iban: &str) -> u32 {
    let (head, tail) = iban.split_at(4);
    tail.chars().chain(head.chars()).fold(0u32, |rem, c| match c.to_digit(36) {
        Some(value) if value >= 10 => (rem * 100 + value) % 97,
        Some(value) => (rem * 10 + value) % 97,
        None => rem,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn accepts_valid_ibans() {
        assert_eq!(check("NL91ABNA0417164300"), Ok(()));
        assert_eq!(check("nl91 abna 0417 1643 00"), Ok(()));
        assert_eq!(check("DE89370400440532013000"), Ok(()));
        assert_eq!(check("GB82WEST12345698765432"), Ok(()));
    }

    #[test]
    fn rejects_bad_check_digits() {
        assert_eq!(check("NL92ABNA0417164300"), Err(Rule::IbanChecksum));
        assert_eq!(check("NL91ABNA0417164301"), Err(Rule::IbanChecksum));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(check(""), Err(Rule::IbanFormat));
        assert_eq!(check("NL91"), Err(Rule::IbanFormat));
        assert_eq!(check("9191ABNA0417164300"), Err(Rule::IbanFormat));
        assert_eq!(check("NL91ABNA04171643-0"), Err(Rule::IbanFormat));
    }

    #[test]
    fn dutch_ibans_need_bank_code_and_account_digits() {
        // digits where the bank code belongs, and wrong lengths
        assert_eq!(check("NL9112340417164300"), Err(Rule::IbanFormat));
        assert_eq!(check("NL91123404171643000"), Err(Rule::IbanFormat));
        assert_eq!(check("NL911234041716430"), Err(Rule::IbanFormat));
    }

    #[test]
    fn normalize_strips_spaces_and_uppercases() {
        assert_eq!(normalize(" nl91 abna\t0417 "), "NL91ABNA0417");
    }
}
