use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// Normalize a monetary value to 2 decimal places. `with_scale` truncates or
/// extends with zeros; prices are entered with at most cent precision so no
/// rounding policy is needed here.
pub fn normalize_scale(value: &BigDecimal) -> BigDecimal {
    value.with_scale(2)
}

/// Value of one inventory line: on-hand quantity times unit price.
pub fn line_value(stock: i32, price: &BigDecimal) -> BigDecimal {
    normalize_scale(&(BigDecimal::from(stock) * price))
}

/// Total value of an inventory: sum of `line_value` over all lines.
pub fn total_stock_value<'a, I>(lines: I) -> BigDecimal
where
    I: IntoIterator<Item = (i32, &'a BigDecimal)>,
{
    let mut total = BigDecimal::from(0);
    for (stock, price) in lines {
        total += line_value(stock, price);
    }
    normalize_scale(&total)
}

/// A monetary value known to be normalized to cent precision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedMoney(BigDecimal);

impl NormalizedMoney {
    pub fn new(raw: BigDecimal) -> Self {
        Self(normalize_scale(&raw))
    }

    pub fn inner(&self) -> &BigDecimal {
        &self.0
    }
}

impl From<BigDecimal> for NormalizedMoney {
    fn from(value: BigDecimal) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn normalize_truncates_to_cents() {
        let v = BigDecimal::from_str("12.3456").unwrap();
        assert_eq!(normalize_scale(&v).to_string(), "12.34");
    }

    #[test]
    fn normalize_extends_with_zeros() {
        let v = BigDecimal::from_str("7").unwrap();
        assert_eq!(normalize_scale(&v).to_string(), "7.00");
    }

    #[test]
    fn line_value_multiplies_stock_by_price() {
        let price = BigDecimal::from_str("2.50").unwrap();
        assert_eq!(line_value(4, &price).to_string(), "10.00");
    }

    #[test]
    fn total_sums_all_lines() {
        let a = BigDecimal::from_str("1.10").unwrap();
        let b = BigDecimal::from_str("3.00").unwrap();
        let total = total_stock_value(vec![(2, &a), (5, &b)]);
        assert_eq!(total.to_string(), "17.20");
    }

    #[test]
    fn total_of_empty_inventory_is_zero() {
        let total = total_stock_value(std::iter::empty());
        assert_eq!(total.to_string(), "0.00");
    }
}
