use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use common_auth::{ensure_role, AuthContext, Role};
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::activity::record_activity;
use crate::app_state::AppState;

#[derive(Debug, Serialize, FromRow)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub cnpj: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub logo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn list_companies(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<Company>>> {
    let companies = sqlx::query_as::<_, Company>(
        "SELECT id, name, cnpj, email, phone, address, logo, created_at, updated_at
         FROM companies
         ORDER BY name",
    )
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    Ok(Json(companies))
}

#[derive(Deserialize)]
pub struct NewCompany {
    pub name: String,
    pub cnpj: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub logo: Option<String>,
}

pub async fn create_company(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<NewCompany>,
) -> ApiResult<(StatusCode, Json<Company>)> {
    ensure_role(&auth, Role::Admin)
        .map_err(|e| ApiError::missing_role(e.required_label(), auth.trace_id))?;

    if payload.name.trim().is_empty() || payload.cnpj.trim().is_empty() {
        return Err(ApiError::bad_request("company_fields_required", auth.trace_id));
    }

    let cnpj_taken = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM companies WHERE cnpj = $1)",
    )
    .bind(payload.cnpj.trim())
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    if cnpj_taken {
        return Err(ApiError::Conflict {
            code: "cnpj_in_use",
            trace_id: auth.trace_id,
            message: Some("CNPJ já está em uso".into()),
        });
    }

    let created = sqlx::query_as::<_, Company>(
        "INSERT INTO companies (id, name, cnpj, email, phone, address, logo)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING id, name, cnpj, email, phone, address, logo, created_at, updated_at",
    )
    .bind(Uuid::new_v4())
    .bind(payload.name.trim())
    .bind(payload.cnpj.trim())
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(&payload.address)
    .bind(&payload.logo)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    record_activity(
        &state.db,
        &state.metrics,
        created.id,
        auth.user_id(),
        "create_company",
        format!("Empresa {} foi criada", created.name),
        "building-add",
        "green",
    )
    .await;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_company(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Company>> {
    let company = sqlx::query_as::<_, Company>(
        "SELECT id, name, cnpj, email, phone, address, logo, created_at, updated_at
         FROM companies
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    company.map(Json).ok_or(ApiError::NotFound {
        code: "company_not_found",
        trace_id: auth.trace_id,
    })
}

#[derive(Deserialize)]
pub struct CompanyUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub logo: Option<String>,
}

pub async fn update_company(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompanyUpdate>,
) -> ApiResult<Json<Company>> {
    ensure_role(&auth, Role::Admin)
        .map_err(|e| ApiError::missing_role(e.required_label(), auth.trace_id))?;

    let updated = sqlx::query_as::<_, Company>(
        "UPDATE companies SET
            name = COALESCE($2, name),
            email = COALESCE($3, email),
            phone = COALESCE($4, phone),
            address = COALESCE($5, address),
            logo = COALESCE($6, logo),
            updated_at = NOW()
         WHERE id = $1
         RETURNING id, name, cnpj, email, phone, address, logo, created_at, updated_at",
    )
    .bind(id)
    .bind(&payload.name)
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(&payload.address)
    .bind(&payload.logo)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    let company = updated.ok_or(ApiError::NotFound {
        code: "company_not_found",
        trace_id: auth.trace_id,
    })?;

    record_activity(
        &state.db,
        &state.metrics,
        auth.company_id(),
        auth.user_id(),
        "update_company",
        format!("Empresa {} foi atualizada", company.name),
        "building-edit",
        "blue",
    )
    .await;

    Ok(Json(company))
}

pub async fn delete_company(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    ensure_role(&auth, Role::Admin)
        .map_err(|e| ApiError::missing_role(e.required_label(), auth.trace_id))?;

    let name = sqlx::query_scalar::<_, String>("SELECT name FROM companies WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, auth.trace_id))?
        .ok_or(ApiError::NotFound {
            code: "company_not_found",
            trace_id: auth.trace_id,
        })?;

    let has_linked_data = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE company_id = $1)
             OR EXISTS(SELECT 1 FROM products WHERE company_id = $1)
             OR EXISTS(SELECT 1 FROM invoices WHERE company_id = $1)
             OR EXISTS(SELECT 1 FROM activities WHERE company_id = $1)",
    )
    .bind(id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    if has_linked_data {
        return Err(ApiError::Conflict {
            code: "company_has_linked_data",
            trace_id: auth.trace_id,
            message: Some(
                "Não é possível excluir a empresa pois existem dados vinculados \
                 (usuários, produtos, notas fiscais ou atividades)"
                    .into(),
            ),
        });
    }

    sqlx::query("DELETE FROM companies WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    record_activity(
        &state.db,
        &state.metrics,
        auth.company_id(),
        auth.user_id(),
        "delete_company",
        format!("Empresa {name} foi excluída"),
        "building-remove",
        "red",
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
