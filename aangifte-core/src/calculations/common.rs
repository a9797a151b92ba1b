//! Decimal helpers shared by the resolver and the calculation engine.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds to cents, half-up (midpoint away from zero).
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use aangifte_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(16681.5)), dec!(16681.50));
/// assert_eq!(round_half_up(dec!(33448.8286)), dec!(33448.83));
/// assert_eq!(round_half_up(dec!(-0.005)), dec!(-0.01));
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Returns the larger of two amounts.
pub fn max(
    a: Decimal,
    b: Decimal,
) -> Decimal {
    if a > b { a } else { b }
}

/// `value` floored at zero.
pub fn non_negative(value: Decimal) -> Decimal {
    max(value, Decimal::ZERO)
}
