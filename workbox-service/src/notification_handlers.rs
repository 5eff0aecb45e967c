use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use common_auth::AuthContext;
use common_http_errors::ApiError;
use serde::Serialize;
use sqlx::query_as;
use uuid::Uuid;

use crate::app_state::AppState;

/// Severity of a notification as shown in the UI popover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Warning,
    Error,
    Success,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
            NotificationKind::Success => "success",
        }
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let notifications = query_as::<_, Notification>(
        "SELECT id, user_id, title, message, type, read, created_at
         FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(auth.user_id())
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    Ok(Json(notifications))
}

pub async fn mark_as_read(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError> {
    // Ownership is enforced in the WHERE clause; a notification belonging to
    // another user reads as not found rather than leaking its existence.
    let updated = query_as::<_, Notification>(
        "UPDATE notifications SET read = TRUE
         WHERE id = $1 AND user_id = $2
         RETURNING id, user_id, title, message, type, read, created_at",
    )
    .bind(notification_id)
    .bind(auth.user_id())
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    match updated {
        Some(notification) => Ok(Json(notification)),
        None => Err(ApiError::NotFound {
            code: "notification_not_found",
            trace_id: auth.trace_id,
        }),
    }
}

pub async fn mark_all_as_read(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<StatusCode, ApiError> {
    sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND read = FALSE")
        .bind(auth.user_id())
        .execute(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_notification(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(notification_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
        .bind(notification_id)
        .bind(auth.user_id())
        .execute(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound {
            code: "notification_not_found",
            trace_id: auth.trace_id,
        });
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(NotificationKind::Warning.as_str(), "warning");
        assert_eq!(NotificationKind::Error.as_str(), "error");
        assert_eq!(
            serde_json::to_string(&NotificationKind::Success).unwrap(),
            "\"success\""
        );
    }
}
