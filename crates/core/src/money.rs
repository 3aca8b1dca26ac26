//! Money helpers.
//!
//! All monetary values are `rust_decimal::Decimal` in minor units; the
//! purchase and top-up paths go through checked arithmetic so overflow
//! surfaces as an error instead of a panic. No floats anywhere.

use rust_decimal::Decimal;

/// Minimum accepted top-up amount, in minor units.
pub fn min_topup() -> Decimal {
    Decimal::ONE_THOUSAND
}

/// Total charge for `quantity` units at `unit_price`.
///
/// Returns `None` on arithmetic overflow; callers map that to an input
/// error rather than letting an absurd quantity wrap.
pub fn line_total(unit_price: Decimal, quantity: i64) -> Option<Decimal> {
    unit_price.checked_mul(Decimal::from(quantity))
}

/// True when `amount` is a whole number of minor units at or above the
/// top-up minimum.
pub fn is_valid_topup(amount: Decimal) -> bool {
    amount >= min_topup() && amount.fract().is_zero()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_total_multiplies() {
        assert_eq!(
            line_total(Decimal::from(1000), 3),
            Some(Decimal::from(3000))
        );
    }

    #[test]
    fn line_total_overflow_is_none() {
        assert_eq!(line_total(Decimal::MAX, 2), None);
    }

    #[test]
    fn topup_validation() {
        assert!(is_valid_topup(Decimal::from(1000)));
        assert!(is_valid_topup(Decimal::from(250_000)));
        assert!(!is_valid_topup(Decimal::from(999)));
        assert!(!is_valid_topup(Decimal::new(10005, 1))); // 1000.5
        assert!(!is_valid_topup(Decimal::from(-1000)));
    }
}
