use axum::{extract::State, Json};
use common_auth::AuthContext;
use common_http_errors::{ApiError, ApiResult};
use serde::Serialize;
use sqlx::FromRow;

use crate::activity::ActivityEntry;
use crate::app_state::AppState;
use crate::product_handlers::Product;

#[derive(Debug, Serialize, FromRow)]
pub struct DashboardStats {
    pub total_products: i64,
    pub low_stock_products: i64,
    pub total_invoices: i64,
    pub pending_invoices: i64,
    pub total_users: i64,
}

pub async fn stats(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<DashboardStats>> {
    // low_stock_products counts both degraded statuses: it feeds the landing
    // page "needs attention" tile, not the per-status breakdown.
    let stats = sqlx::query_as::<_, DashboardStats>(
        "SELECT
            (SELECT COUNT(*) FROM products WHERE company_id = $1) AS total_products,
            (SELECT COUNT(*) FROM products WHERE company_id = $1 AND status IN ('low', 'critical')) AS low_stock_products,
            (SELECT COUNT(*) FROM invoices WHERE company_id = $1) AS total_invoices,
            (SELECT COUNT(*) FROM invoices WHERE company_id = $1 AND status = 'pending') AS pending_invoices,
            (SELECT COUNT(*) FROM users WHERE company_id = $1) AS total_users",
    )
    .bind(auth.company_id())
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    Ok(Json(stats))
}

pub async fn recent_activities(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<ActivityEntry>>> {
    let entries = sqlx::query_as::<_, ActivityEntry>(
        "SELECT a.id, a.action, a.description, a.icon, a.color,
                a.user_id, u.name AS user_name, u.avatar AS user_avatar, a.created_at
         FROM activities a
         JOIN users u ON u.id = a.user_id
         WHERE a.company_id = $1
         ORDER BY a.created_at DESC
         LIMIT 10",
    )
    .bind(auth.company_id())
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    Ok(Json(entries))
}

pub async fn top_products(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<Product>>> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT id, name, category, sku, description, stock, minimum, price, status, created_at, updated_at
         FROM products
         WHERE company_id = $1
         ORDER BY stock DESC
         LIMIT 5",
    )
    .bind(auth.company_id())
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    Ok(Json(products))
}

#[derive(Debug, Serialize)]
pub struct StockAlerts {
    pub low_stock_products: Vec<Product>,
    pub critical_stock_products: Vec<Product>,
}

pub async fn stock_alerts(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<StockAlerts>> {
    let low = sqlx::query_as::<_, Product>(
        "SELECT id, name, category, sku, description, stock, minimum, price, status, created_at, updated_at
         FROM products
         WHERE company_id = $1 AND status = 'low'
         ORDER BY stock ASC
         LIMIT 5",
    )
    .bind(auth.company_id())
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    let critical = sqlx::query_as::<_, Product>(
        "SELECT id, name, category, sku, description, stock, minimum, price, status, created_at, updated_at
         FROM products
         WHERE company_id = $1 AND status = 'critical'
         ORDER BY stock ASC
         LIMIT 5",
    )
    .bind(auth.company_id())
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    Ok(Json(StockAlerts {
        low_stock_products: low,
        critical_stock_products: critical,
    }))
}
