use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use common_auth::{ensure_any_role, AuthContext, Role};
use common_http_errors::{ApiError, ApiResult};
use common_money::{normalize_scale, total_stock_value};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::activity::record_activity;
use crate::app_state::AppState;
use crate::stock::{fan_out_stock_alert, should_alert, AlertOrigin, StockStatus};

#[derive(Debug, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub stock: i32,
    pub minimum: i32,
    pub price: BigDecimal,
    pub status: StockStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const PRODUCT_COLUMNS: &str = "id, name, category, sku, description, stock, minimum, price, status, created_at, updated_at";

#[derive(Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub status: Option<StockStatus>,
    pub search: Option<String>,
}

pub async fn list_products(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(filter): Query<ProductFilter>,
) -> ApiResult<Json<Vec<Product>>> {
    let search_pattern = filter
        .search
        .as_deref()
        .map(|term| format!("%{}%", term.trim()));

    let products = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS}
         FROM products
         WHERE company_id = $1
           AND ($2::text IS NULL OR category = $2)
           AND ($3::stock_status IS NULL OR status = $3)
           AND ($4::text IS NULL OR name ILIKE $4 OR description ILIKE $4)
         ORDER BY name"
    ))
    .bind(auth.company_id())
    .bind(&filter.category)
    .bind(filter.status)
    .bind(&search_pattern)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    Ok(Json(products))
}

#[derive(Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub stock: i32,
    pub minimum: i32,
    pub price: BigDecimal,
}

pub async fn create_product(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<NewProduct>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::bad_request("product_name_required", auth.trace_id));
    }
    if payload.stock < 0 || payload.minimum < 0 {
        return Err(ApiError::bad_request("negative_stock", auth.trace_id));
    }

    let status = state.stock_policy.classify(payload.stock, payload.minimum);
    let price = normalize_scale(&payload.price);

    let created = sqlx::query_as::<_, Product>(&format!(
        "INSERT INTO products (id, company_id, name, category, sku, description, stock, minimum, price, status)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(auth.company_id())
    .bind(payload.name.trim())
    .bind(&payload.category)
    .bind(&payload.sku)
    .bind(&payload.description)
    .bind(payload.stock)
    .bind(payload.minimum)
    .bind(&price)
    .bind(status)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    record_activity(
        &state.db,
        &state.metrics,
        auth.company_id(),
        auth.user_id(),
        "create_product",
        format!("Produto {} foi adicionado ao estoque", created.name),
        "package-plus",
        "green",
    )
    .await;

    // Creation has no prior status: any degraded landing alerts.
    if should_alert(None, created.status) {
        fan_out_stock_alert(
            &state.db,
            &state.metrics,
            auth.company_id(),
            &created.name,
            created.status,
            AlertOrigin::Created,
        )
        .await;
    }

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_product(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Product>> {
    #[derive(FromRow)]
    struct ProductWithOwner {
        #[sqlx(flatten)]
        product: Product,
        company_id: Uuid,
    }

    let row = sqlx::query_as::<_, ProductWithOwner>(&format!(
        "SELECT {PRODUCT_COLUMNS}, company_id FROM products WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    let row = row.ok_or(ApiError::NotFound {
        code: "product_not_found",
        trace_id: auth.trace_id,
    })?;

    // Existence leaks across tenants by design of the original API: a foreign
    // product id is refused, not hidden.
    if row.company_id != auth.company_id() {
        return Err(ApiError::Forbidden {
            trace_id: auth.trace_id,
        });
    }

    Ok(Json(row.product))
}

#[derive(Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub stock: Option<i32>,
    pub minimum: Option<i32>,
    pub price: Option<BigDecimal>,
}

pub async fn update_product(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProductUpdate>,
) -> ApiResult<Json<Product>> {
    if payload.stock.is_some_and(|s| s < 0) || payload.minimum.is_some_and(|m| m < 0) {
        return Err(ApiError::bad_request("negative_stock", auth.trace_id));
    }

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    #[derive(FromRow)]
    struct CurrentRow {
        company_id: Uuid,
        name: String,
        stock: i32,
        minimum: i32,
        status: StockStatus,
    }

    // Row lock so a concurrent update cannot interleave between the read of
    // the prior status and the write of the recomputed one.
    let current = sqlx::query_as::<_, CurrentRow>(
        "SELECT company_id, name, stock, minimum, status FROM products WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    let current = current.ok_or(ApiError::NotFound {
        code: "product_not_found",
        trace_id: auth.trace_id,
    })?;

    if current.company_id != auth.company_id() {
        return Err(ApiError::Forbidden {
            trace_id: auth.trace_id,
        });
    }

    let new_stock = payload.stock.unwrap_or(current.stock);
    let new_minimum = payload.minimum.unwrap_or(current.minimum);
    let new_status = state.stock_policy.classify(new_stock, new_minimum);
    let price = payload.price.as_ref().map(normalize_scale);

    let updated = sqlx::query_as::<_, Product>(&format!(
        "UPDATE products SET
            name = COALESCE($2, name),
            category = COALESCE($3, category),
            sku = COALESCE($4, sku),
            description = COALESCE($5, description),
            stock = $6,
            minimum = $7,
            price = COALESCE($8, price),
            status = $9,
            updated_at = NOW()
         WHERE id = $1
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(id)
    .bind(&payload.name)
    .bind(&payload.category)
    .bind(&payload.sku)
    .bind(&payload.description)
    .bind(new_stock)
    .bind(new_minimum)
    .bind(&price)
    .bind(new_status)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    tx.commit()
        .await
        .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    record_activity(
        &state.db,
        &state.metrics,
        auth.company_id(),
        auth.user_id(),
        "update_product",
        format!("Produto {} foi atualizado", current.name),
        "package-edit",
        "blue",
    )
    .await;

    // Fan out only after the commit, so readers of the notification already
    // see the product in its degraded status.
    if should_alert(Some(current.status), new_status) {
        fan_out_stock_alert(
            &state.db,
            &state.metrics,
            auth.company_id(),
            &updated.name,
            new_status,
            AlertOrigin::Updated,
        )
        .await;
    }

    Ok(Json(updated))
}

pub async fn delete_product(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    ensure_any_role(&auth, &[Role::Admin, Role::Manager])
        .map_err(|e| ApiError::missing_role(e.required_label(), auth.trace_id))?;

    #[derive(FromRow)]
    struct OwnerRow {
        company_id: Uuid,
        name: String,
    }

    let row = sqlx::query_as::<_, OwnerRow>("SELECT company_id, name FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    let row = row.ok_or(ApiError::NotFound {
        code: "product_not_found",
        trace_id: auth.trace_id,
    })?;

    if row.company_id != auth.company_id() {
        return Err(ApiError::Forbidden {
            trace_id: auth.trace_id,
        });
    }

    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    record_activity(
        &state.db,
        &state.metrics,
        auth.company_id(),
        auth.user_id(),
        "delete_product",
        format!("Produto {} foi excluído", row.name),
        "package-minus",
        "red",
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct StockSummary {
    pub total_products: i64,
    pub low_stock_products: i64,
    pub critical_stock_products: i64,
    pub total_value: BigDecimal,
}

pub async fn stock_summary(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<StockSummary>> {
    #[derive(FromRow)]
    struct Counts {
        total: i64,
        low: i64,
        critical: i64,
    }

    let counts = sqlx::query_as::<_, Counts>(
        "SELECT COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'low') AS low,
                COUNT(*) FILTER (WHERE status = 'critical') AS critical
         FROM products
         WHERE company_id = $1",
    )
    .bind(auth.company_id())
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    #[derive(FromRow)]
    struct Line {
        stock: i32,
        price: BigDecimal,
    }

    let lines = sqlx::query_as::<_, Line>(
        "SELECT stock, price FROM products WHERE company_id = $1",
    )
    .bind(auth.company_id())
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    let total_value = total_stock_value(lines.iter().map(|line| (line.stock, &line.price)));

    Ok(Json(StockSummary {
        total_products: counts.total,
        low_stock_products: counts.low,
        critical_stock_products: counts.critical,
        total_value,
    }))
}
