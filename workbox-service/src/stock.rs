use common_observability::WorkboxMetrics;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::notification_handlers::NotificationKind;

/// Derived stock level of a product. Never set directly: every write of
/// `(stock, minimum)` recomputes it through [`StockPolicy::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "stock_status", rename_all = "lowercase")]
pub enum StockStatus {
    Normal,
    Low,
    Critical,
}

impl StockStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, StockStatus::Low | StockStatus::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::Normal => "normal",
            StockStatus::Low => "low",
            StockStatus::Critical => "critical",
        }
    }
}

/// Classification rule for stock levels.
///
/// The Low boundary is configurable: the product is Low when
/// `stock <= minimum + low_stock_margin_units`. A margin of 0 flags products
/// at or below their reorder threshold; deployments that want earlier warning
/// can widen it (STOCK_LOW_MARGIN_UNITS).
#[derive(Debug, Clone, Copy)]
pub struct StockPolicy {
    pub low_stock_margin_units: i32,
}

impl Default for StockPolicy {
    fn default() -> Self {
        Self {
            low_stock_margin_units: 0,
        }
    }
}

impl StockPolicy {
    /// Total over non-negative inputs; callers validate sign.
    /// Critical at or below half the minimum, Low at or below the minimum
    /// plus the configured margin, Normal above that.
    pub fn classify(&self, stock: i32, minimum: i32) -> StockStatus {
        // Integer form of `stock <= minimum * 0.5`, widened to avoid overflow.
        if (stock as i64) * 2 <= minimum as i64 {
            StockStatus::Critical
        } else if (stock as i64) <= minimum as i64 + self.low_stock_margin_units as i64 {
            StockStatus::Low
        } else {
            StockStatus::Normal
        }
    }
}

/// Whether a write of `(stock, minimum)` must fan out alert notifications.
///
/// Creation has no prior state, so landing in a degraded status counts as a
/// transition-in. Updates alert only on crossing the Normal boundary into a
/// degraded status; re-entering or moving between degraded statuses stays
/// silent, as does recovering to Normal.
pub fn should_alert(previous: Option<StockStatus>, next: StockStatus) -> bool {
    next.is_degraded() && previous.map_or(true, |prev| prev == StockStatus::Normal)
}

/// Which write produced the alert; only affects message wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOrigin {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAlert {
    pub title: &'static str,
    pub message: String,
    pub kind: NotificationKind,
}

/// Render the notification for a degraded-entry transition. Returns `None`
/// for Normal, which is never alertable.
pub fn build_alert(product_name: &str, status: StockStatus, origin: AlertOrigin) -> Option<StockAlert> {
    let (title, kind, adjective) = match status {
        StockStatus::Normal => return None,
        StockStatus::Low => ("Estoque baixo", NotificationKind::Warning, "baixo"),
        StockStatus::Critical => ("Estoque crítico", NotificationKind::Error, "crítico"),
    };

    let message = match origin {
        AlertOrigin::Created => {
            format!("O produto {product_name} foi cadastrado com estoque {adjective}.")
        }
        AlertOrigin::Updated => {
            format!("O produto {product_name} está com estoque {adjective}.")
        }
    };

    Some(StockAlert {
        title,
        message,
        kind,
    })
}

#[derive(sqlx::FromRow)]
struct AlertRecipient {
    id: Uuid,
}

/// Fan out one notification per eligible recipient: every active admin or
/// manager of the product's company. Runs after the product write has
/// committed. A failed recipient write never propagates; it is logged and
/// counted so the gap can be reconciled later.
pub async fn fan_out_stock_alert(
    db: &PgPool,
    metrics: &WorkboxMetrics,
    company_id: Uuid,
    product_name: &str,
    status: StockStatus,
    origin: AlertOrigin,
) {
    let alert = match build_alert(product_name, status, origin) {
        Some(alert) => alert,
        None => return,
    };

    let recipients = match sqlx::query_as::<_, AlertRecipient>(
        "SELECT id FROM users
         WHERE company_id = $1 AND status = 'active' AND role IN ('admin', 'manager')",
    )
    .bind(company_id)
    .fetch_all(db)
    .await
    {
        Ok(recipients) => recipients,
        Err(err) => {
            warn!(?err, company_id = %company_id, "Failed to load stock alert recipients");
            metrics.stock_alert_recipient_failures.inc();
            return;
        }
    };

    metrics
        .stock_alerts_total
        .with_label_values(&[status.as_str()])
        .inc();

    let total = recipients.len();
    let mut failed = 0usize;
    for recipient in recipients {
        let result = sqlx::query(
            "INSERT INTO notifications (id, user_id, title, message, type)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(recipient.id)
        .bind(alert.title)
        .bind(&alert.message)
        .bind(alert.kind.as_str())
        .execute(db)
        .await;

        if let Err(err) = result {
            warn!(
                ?err,
                user_id = %recipient.id,
                company_id = %company_id,
                "Failed to write stock alert notification"
            );
            failed += 1;
        }
    }

    if failed > 0 {
        metrics
            .stock_alert_recipient_failures
            .inc_by(failed as u64);
        warn!(
            company_id = %company_id,
            product = product_name,
            status = status.as_str(),
            failed,
            total,
            "Stock status changed but some alert recipients were not notified"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: StockPolicy = StockPolicy {
        low_stock_margin_units: 0,
    };
    const LEGACY_MARGIN: StockPolicy = StockPolicy {
        low_stock_margin_units: 5,
    };

    #[test]
    fn critical_at_or_below_half_of_minimum() {
        assert_eq!(DEFAULT.classify(5, 10), StockStatus::Critical);
        assert_eq!(DEFAULT.classify(4, 10), StockStatus::Critical);
        assert_eq!(DEFAULT.classify(5, 11), StockStatus::Critical);
        assert_eq!(DEFAULT.classify(6, 11), StockStatus::Low);
    }

    #[test]
    fn zero_minimum_forces_critical_only_at_zero_stock() {
        assert_eq!(DEFAULT.classify(0, 0), StockStatus::Critical);
        assert_eq!(DEFAULT.classify(1, 0), StockStatus::Normal);
    }

    #[test]
    fn low_boundary_is_inclusive_of_minimum() {
        assert_eq!(DEFAULT.classify(10, 10), StockStatus::Low);
        assert_eq!(DEFAULT.classify(11, 10), StockStatus::Normal);
    }

    #[test]
    fn legacy_margin_widens_the_low_band() {
        assert_eq!(LEGACY_MARGIN.classify(15, 10), StockStatus::Low);
        assert_eq!(LEGACY_MARGIN.classify(16, 10), StockStatus::Normal);
        // The Critical boundary is unaffected by the margin.
        assert_eq!(LEGACY_MARGIN.classify(5, 10), StockStatus::Critical);
    }

    #[test]
    fn classify_is_pure() {
        for _ in 0..3 {
            assert_eq!(DEFAULT.classify(7, 10), StockStatus::Low);
        }
    }

    #[test]
    fn large_values_do_not_overflow() {
        assert_eq!(DEFAULT.classify(i32::MAX, i32::MAX), StockStatus::Low);
        assert_eq!(
            DEFAULT.classify(i32::MAX / 2, i32::MAX),
            StockStatus::Critical
        );
    }

    #[test]
    fn creation_alerts_whenever_degraded() {
        assert!(should_alert(None, StockStatus::Low));
        assert!(should_alert(None, StockStatus::Critical));
        assert!(!should_alert(None, StockStatus::Normal));
    }

    #[test]
    fn update_alerts_only_on_normal_to_degraded() {
        assert!(should_alert(Some(StockStatus::Normal), StockStatus::Low));
        assert!(should_alert(
            Some(StockStatus::Normal),
            StockStatus::Critical
        ));

        // Staying degraded or moving between degraded statuses stays silent.
        assert!(!should_alert(Some(StockStatus::Low), StockStatus::Low));
        assert!(!should_alert(Some(StockStatus::Low), StockStatus::Critical));
        assert!(!should_alert(
            Some(StockStatus::Critical),
            StockStatus::Low
        ));

        // Recovery is not alertable.
        assert!(!should_alert(Some(StockStatus::Low), StockStatus::Normal));
        assert!(!should_alert(
            Some(StockStatus::Critical),
            StockStatus::Normal
        ));
    }

    #[test]
    fn alert_wording_for_creation() {
        let alert = build_alert("Parafuso M4", StockStatus::Critical, AlertOrigin::Created)
            .expect("critical alerts");
        assert_eq!(alert.title, "Estoque crítico");
        assert_eq!(alert.kind, NotificationKind::Error);
        assert_eq!(
            alert.message,
            "O produto Parafuso M4 foi cadastrado com estoque crítico."
        );
    }

    #[test]
    fn alert_wording_for_update() {
        let alert = build_alert("Parafuso M4", StockStatus::Low, AlertOrigin::Updated)
            .expect("low alerts");
        assert_eq!(alert.title, "Estoque baixo");
        assert_eq!(alert.kind, NotificationKind::Warning);
        assert_eq!(
            alert.message,
            "O produto Parafuso M4 está com estoque baixo."
        );
    }

    #[test]
    fn normal_status_never_builds_an_alert() {
        assert!(build_alert("X", StockStatus::Normal, AlertOrigin::Created).is_none());
        assert!(build_alert("X", StockStatus::Normal, AlertOrigin::Updated).is_none());
    }
}
