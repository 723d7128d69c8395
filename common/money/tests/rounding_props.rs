use common_money::{format_amount, normalize_scale, Amount};
use bigdecimal::BigDecimal;
use proptest::prelude::*;
use std::str::FromStr;

proptest! {
    // Build value = whole.cents + one extra thousandth digit and check half-up on that digit.
    #[test]
    fn half_up_on_third_digit(whole in 0i64..100_000, cents in 0u32..100, thousandth in 0u32..10) {
        let s = format!("{}.{:02}{}", whole, cents, thousandth);
        let bd = BigDecimal::from_str(&s).unwrap();
        let base = BigDecimal::from_str(&format!("{}.{:02}", whole, cents)).unwrap();
        let expected = if thousandth >= 5 { base + BigDecimal::from_str("0.01").unwrap() } else { base };
        prop_assert_eq!(normalize_scale(&bd), expected.with_scale(2));
    }

    // Whatever the input precision, the wire form has exactly two fractional digits.
    #[test]
    fn always_two_fraction_digits(v in 0.0f64..1_000_000.0) {
        let amount = Amount::from_f64(v).unwrap();
        let fixed = amount.to_fixed();
        let dot = fixed.find('.').expect("decimal point");
        prop_assert_eq!(fixed.len() - dot - 1, 2, "input={} fixed={}", v, fixed);
    }

    // Formatting is idempotent: re-parsing the two-decimal form yields the same string.
    #[test]
    fn format_idempotent(cents in 0i64..10_000_000) {
        let bd = BigDecimal::new(cents.into(), 2);
        let once = format_amount(&bd);
        let twice = format_amount(&BigDecimal::from_str(&once).unwrap());
        prop_assert_eq!(once, twice);
    }
}
