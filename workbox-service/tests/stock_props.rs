use proptest::prelude::*;
use workbox_service::stock::{should_alert, StockPolicy, StockStatus};

proptest! {
    // Critical takes precedence over everything: any stock at or below half
    // the minimum classifies Critical, whatever the configured margin.
    #[test]
    fn critical_whenever_stock_at_or_below_half_minimum(
        stock in 0i32..1_000_000,
        minimum in 0i32..1_000_000,
        margin in 0i32..100,
    ) {
        let policy = StockPolicy { low_stock_margin_units: margin };
        if (stock as i64) * 2 <= minimum as i64 {
            prop_assert_eq!(policy.classify(stock, minimum), StockStatus::Critical);
        }
    }

    #[test]
    fn low_band_sits_between_critical_and_normal(
        stock in 0i32..1_000_000,
        minimum in 0i32..1_000_000,
    ) {
        let policy = StockPolicy { low_stock_margin_units: 0 };
        if (stock as i64) * 2 > minimum as i64 && stock <= minimum {
            prop_assert_eq!(policy.classify(stock, minimum), StockStatus::Low);
        }
    }

    #[test]
    fn normal_strictly_above_minimum(
        stock in 0i32..1_000_000,
        minimum in 0i32..1_000_000,
    ) {
        let policy = StockPolicy { low_stock_margin_units: 0 };
        if stock > minimum {
            prop_assert_eq!(policy.classify(stock, minimum), StockStatus::Normal);
        }
    }

    // Purity: two calls with identical inputs always agree.
    #[test]
    fn classify_is_deterministic(
        stock in 0i32..1_000_000,
        minimum in 0i32..1_000_000,
        margin in 0i32..100,
    ) {
        let policy = StockPolicy { low_stock_margin_units: margin };
        prop_assert_eq!(policy.classify(stock, minimum), policy.classify(stock, minimum));
    }

    // Alerts fire only on entry into a degraded status from Normal (or from
    // nothing at all), never while already degraded.
    #[test]
    fn no_alert_when_previous_status_was_degraded(
        prev in prop_oneof![Just(StockStatus::Low), Just(StockStatus::Critical)],
        next in prop_oneof![
            Just(StockStatus::Normal),
            Just(StockStatus::Low),
            Just(StockStatus::Critical)
        ],
    ) {
        prop_assert!(!should_alert(Some(prev), next));
    }

    #[test]
    fn alert_iff_next_is_degraded_when_previous_was_normal(
        next in prop_oneof![
            Just(StockStatus::Normal),
            Just(StockStatus::Low),
            Just(StockStatus::Critical)
        ],
    ) {
        prop_assert_eq!(
            should_alert(Some(StockStatus::Normal), next),
            next.is_degraded()
        );
        prop_assert_eq!(should_alert(None, next), next.is_degraded());
    }
}

#[test]
fn pinned_boundaries() {
    let policy = StockPolicy { low_stock_margin_units: 0 };
    assert_eq!(policy.classify(0, 0), StockStatus::Critical);
    // Margin 0 pins the strict boundary variant: at-minimum is Low.
    assert_eq!(policy.classify(10, 10), StockStatus::Low);
    assert_eq!(policy.classify(11, 10), StockStatus::Normal);
}
