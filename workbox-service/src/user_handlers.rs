use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use common_auth::{ensure_any_role, ensure_role, AuthContext, Role};
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::activity::record_activity;
use crate::app_state::AppState;
use crate::auth_handlers::hash_password;

#[derive(Debug, Serialize, FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub department: Option<String>,
    pub avatar: Option<String>,
    pub last_access: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const USER_COLUMNS: &str =
    "id, name, email, role, status, department, avatar, last_access, created_at, updated_at";

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<UserSummary>>> {
    let users = sqlx::query_as::<_, UserSummary>(
        "SELECT id, name, email, role, status, department, avatar, last_access, created_at, updated_at
         FROM users
         WHERE company_id = $1
         ORDER BY name",
    )
    .bind(auth.company_id())
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    Ok(Json(users))
}

#[derive(Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: String,
    pub department: Option<String>,
}

fn default_role() -> String {
    "user".to_string()
}

pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<UserSummary>)> {
    ensure_any_role(&auth, &[Role::Admin, Role::Manager])
        .map_err(|e| ApiError::missing_role(e.required_label(), auth.trace_id))?;

    if payload.name.trim().is_empty() || payload.email.trim().is_empty() {
        return Err(ApiError::bad_request("user_fields_required", auth.trace_id));
    }

    let email_taken = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)",
    )
    .bind(&payload.email)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    if email_taken {
        return Err(ApiError::Conflict {
            code: "email_in_use",
            trace_id: auth.trace_id,
            message: Some("Email já está em uso".into()),
        });
    }

    let password_hash =
        hash_password(&payload.password).map_err(|(status, message)| match status {
            StatusCode::BAD_REQUEST => ApiError::BadRequest {
                code: "invalid_password",
                trace_id: auth.trace_id,
                message: Some(message),
            },
            _ => ApiError::internal(message, auth.trace_id),
        })?;

    let created = sqlx::query_as::<_, UserSummary>(&format!(
        "INSERT INTO users (id, company_id, name, email, password_hash, role, status, department)
         VALUES ($1, $2, $3, $4, $5, $6, 'active', $7)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(auth.company_id())
    .bind(payload.name.trim())
    .bind(payload.email.trim())
    .bind(&password_hash)
    .bind(&payload.role)
    .bind(&payload.department)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    record_activity(
        &state.db,
        &state.metrics,
        auth.company_id(),
        auth.user_id(),
        "create_user",
        format!("Usuário {} foi criado", created.name),
        "user-plus",
        "green",
    )
    .await;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserSummary>> {
    let user = sqlx::query_as::<_, UserSummary>(
        "SELECT id, name, email, role, status, department, avatar, last_access, created_at, updated_at
         FROM users
         WHERE id = $1 AND company_id = $2",
    )
    .bind(id)
    .bind(auth.company_id())
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    user.map(Json).ok_or(ApiError::NotFound {
        code: "user_not_found",
        trace_id: auth.trace_id,
    })
}

#[derive(Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub department: Option<String>,
    pub password: Option<String>,
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<UserUpdate>,
) -> ApiResult<Json<UserSummary>> {
    let existing = sqlx::query_scalar::<_, String>(
        "SELECT name FROM users WHERE id = $1 AND company_id = $2",
    )
    .bind(id)
    .bind(auth.company_id())
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    let previous_name = existing.ok_or(ApiError::NotFound {
        code: "user_not_found",
        trace_id: auth.trace_id,
    })?;

    // Role and status changes are a privileged operation.
    if payload.role.is_some() || payload.status.is_some() {
        ensure_any_role(&auth, &[Role::Admin, Role::Manager])
            .map_err(|e| ApiError::missing_role(e.required_label(), auth.trace_id))?;
    }

    if let Some(email) = payload.email.as_deref() {
        let email_taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND id <> $2)",
        )
        .bind(email)
        .bind(id)
        .fetch_one(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, auth.trace_id))?;

        if email_taken {
            return Err(ApiError::Conflict {
                code: "email_in_use",
                trace_id: auth.trace_id,
                message: Some("Email já está em uso".into()),
            });
        }
    }

    let password_hash = match payload.password.as_deref() {
        Some(password) => Some(hash_password(password).map_err(|(status, message)| {
            match status {
                StatusCode::BAD_REQUEST => ApiError::BadRequest {
                    code: "invalid_password",
                    trace_id: auth.trace_id,
                    message: Some(message),
                },
                _ => ApiError::internal(message, auth.trace_id),
            }
        })?),
        None => None,
    };

    let updated = sqlx::query_as::<_, UserSummary>(&format!(
        "UPDATE users SET
            name = COALESCE($3, name),
            email = COALESCE($4, email),
            role = COALESCE($5, role),
            status = COALESCE($6, status),
            department = COALESCE($7, department),
            password_hash = COALESCE($8, password_hash),
            updated_at = NOW()
         WHERE id = $1 AND company_id = $2
         RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(auth.company_id())
    .bind(&payload.name)
    .bind(&payload.email)
    .bind(&payload.role)
    .bind(&payload.status)
    .bind(&payload.department)
    .bind(&password_hash)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    record_activity(
        &state.db,
        &state.metrics,
        auth.company_id(),
        auth.user_id(),
        "update_user",
        format!("Usuário {previous_name} foi atualizado"),
        "user-edit",
        "blue",
    )
    .await;

    Ok(Json(updated))
}

pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    ensure_role(&auth, Role::Admin)
        .map_err(|e| ApiError::missing_role(e.required_label(), auth.trace_id))?;

    let deleted_name = sqlx::query_scalar::<_, String>(
        "DELETE FROM users WHERE id = $1 AND company_id = $2 RETURNING name",
    )
    .bind(id)
    .bind(auth.company_id())
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    let name = deleted_name.ok_or(ApiError::NotFound {
        code: "user_not_found",
        trace_id: auth.trace_id,
    })?;

    record_activity(
        &state.db,
        &state.metrics,
        auth.company_id(),
        auth.user_id(),
        "delete_user",
        format!("Usuário {name} foi excluído"),
        "user-minus",
        "red",
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize, FromRow)]
pub struct CompanySummary {
    pub id: Uuid,
    pub name: String,
    pub cnpj: String,
    pub logo: Option<String>,
}

/// Companies the authenticated user belongs to. One per user today; returned
/// as a list so the session picker keeps working if that ever grows.
pub async fn my_companies(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<CompanySummary>>> {
    let companies = sqlx::query_as::<_, CompanySummary>(
        "SELECT c.id, c.name, c.cnpj, c.logo
         FROM companies c
         JOIN users u ON u.company_id = c.id
         WHERE u.id = $1",
    )
    .bind(auth.user_id())
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    Ok(Json(companies))
}
