use bigdecimal::BigDecimal;
use common_money::{line_value, normalize_scale, total_stock_value};
use proptest::prelude::*;
use std::str::FromStr;

proptest! {
    #[test]
    fn normalized_values_always_have_scale_two(cents in -1_000_000i64..1_000_000) {
        let raw = BigDecimal::from(cents) / BigDecimal::from(100);
        let normalized = normalize_scale(&raw);
        let rendered = normalized.to_string();
        let decimals = rendered.split('.').nth(1).map(str::len).unwrap_or(0);
        prop_assert_eq!(decimals, 2, "rendered: {}", rendered);
    }

    #[test]
    fn line_value_is_nonnegative_for_nonnegative_inputs(stock in 0i32..100_000, cents in 0i64..1_000_000) {
        let price = BigDecimal::from(cents) / BigDecimal::from(100);
        let value = line_value(stock, &price);
        prop_assert!(value >= BigDecimal::from(0));
    }

    #[test]
    fn total_equals_sum_of_lines(stocks in proptest::collection::vec((0i32..1_000, 0i64..100_000), 0..10)) {
        let prices: Vec<BigDecimal> = stocks
            .iter()
            .map(|(_, cents)| BigDecimal::from(*cents) / BigDecimal::from(100))
            .collect();
        let total = total_stock_value(
            stocks.iter().map(|(stock, _)| *stock).zip(prices.iter()),
        );

        let mut expected = BigDecimal::from_str("0").unwrap();
        for ((stock, _), price) in stocks.iter().zip(prices.iter()) {
            expected += line_value(*stock, price);
        }
        prop_assert_eq!(total, normalize_scale(&expected));
    }
}
