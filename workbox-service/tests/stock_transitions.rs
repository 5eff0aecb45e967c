use workbox_service::notification_handlers::NotificationKind;
use workbox_service::stock::{
    build_alert, should_alert, AlertOrigin, StockPolicy, StockStatus,
};

const POLICY: StockPolicy = StockPolicy {
    low_stock_margin_units: 0,
};

#[test]
fn healthy_product_creation_stays_silent() {
    let status = POLICY.classify(15, 10);
    assert_eq!(status, StockStatus::Normal);
    assert!(!should_alert(None, status));
    assert!(build_alert("Teclado", status, AlertOrigin::Created).is_none());
}

#[test]
fn creation_below_half_minimum_alerts_as_critical() {
    let status = POLICY.classify(5, 15);
    assert_eq!(status, StockStatus::Critical);
    assert!(should_alert(None, status));

    let alert = build_alert("Teclado", status, AlertOrigin::Created).unwrap();
    assert_eq!(alert.kind, NotificationKind::Error);
    assert_eq!(alert.title, "Estoque crítico");
}

#[test]
fn normal_product_dropping_to_low_alerts_once_with_warning() {
    let previous = POLICY.classify(20, 10);
    assert_eq!(previous, StockStatus::Normal);

    let next = POLICY.classify(8, 10);
    assert_eq!(next, StockStatus::Low);
    assert!(should_alert(Some(previous), next));

    let alert = build_alert("Monitor", next, AlertOrigin::Updated).unwrap();
    assert_eq!(alert.kind, NotificationKind::Warning);
    assert_eq!(alert.message, "O produto Monitor está com estoque baixo.");
}

#[test]
fn low_product_sinking_further_within_low_stays_silent() {
    let previous = POLICY.classify(8, 10);
    assert_eq!(previous, StockStatus::Low);

    let next = POLICY.classify(7, 10);
    assert_eq!(next, StockStatus::Low);
    assert!(!should_alert(Some(previous), next));
}

#[test]
fn recovery_to_normal_never_notifies() {
    let previous = POLICY.classify(4, 10);
    assert_eq!(previous, StockStatus::Critical);

    let next = POLICY.classify(20, 10);
    assert_eq!(next, StockStatus::Normal);
    assert!(!should_alert(Some(previous), next));
    assert!(build_alert("Mouse", next, AlertOrigin::Updated).is_none());
}
