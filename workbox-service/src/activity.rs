use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use common_auth::AuthContext;
use common_http_errors::ApiError;
use common_observability::WorkboxMetrics;
use serde::{Deserialize, Serialize};
use sqlx::{query_as, PgPool};
use tracing::warn;
use uuid::Uuid;

use crate::app_state::AppState;

/// Write one activity row for a mutating operation. Activity logging is
/// best-effort: a failed write is logged and counted, never propagated, so
/// the triggering request still succeeds.
pub async fn record_activity(
    db: &PgPool,
    metrics: &WorkboxMetrics,
    company_id: Uuid,
    user_id: Uuid,
    action: &str,
    description: String,
    icon: &str,
    color: &str,
) {
    let result = sqlx::query(
        "INSERT INTO activities (id, company_id, user_id, action, description, icon, color)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(Uuid::new_v4())
    .bind(company_id)
    .bind(user_id)
    .bind(action)
    .bind(description)
    .bind(icon)
    .bind(color)
    .execute(db)
    .await;

    if let Err(err) = result {
        warn!(?err, company_id = %company_id, action, "Failed to write activity log");
        metrics.activity_write_failures.inc();
    }
}

#[derive(Deserialize)]
pub struct ActivityQuery {
    limit: Option<i64>,
    offset: Option<i64>,
    user_id: Option<Uuid>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub action: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub async fn list_activities(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(params): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityEntry>>, ApiError> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let offset = params.offset.unwrap_or(0).max(0);

    let entries = query_as::<_, ActivityEntry>(
        "SELECT a.id, a.action, a.description, a.icon, a.color,
                a.user_id, u.name AS user_name, u.avatar AS user_avatar, a.created_at
         FROM activities a
         JOIN users u ON u.id = a.user_id
         WHERE a.company_id = $1 AND ($2::uuid IS NULL OR a.user_id = $2)
         ORDER BY a.created_at DESC
         LIMIT $3 OFFSET $4",
    )
    .bind(auth.company_id())
    .bind(params.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    Ok(Json(entries))
}
