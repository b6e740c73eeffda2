//! Money helpers

use rust_decimal::Decimal;

/// Whether `amount` is expressible in whole cents (trailing zeros ignored)
pub fn is_whole_cents(amount: Decimal) -> bool {
    amount.normalize().scale() <= 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_is_whole_cents() {
        assert!(is_whole_cents(dec!(25)));
        assert!(is_whole_cents(dec!(19.99)));
        assert!(is_whole_cents(dec!(12.5000)));
        assert!(!is_whole_cents(dec!(0.004)));
        assert!(!is_whole_cents(dec!(19.995)));
    }
}
