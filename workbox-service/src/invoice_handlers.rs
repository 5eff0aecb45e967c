use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use common_auth::{ensure_role, AuthContext, Role};
use common_http_errors::{ApiError, ApiResult};
use common_money::normalize_scale;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

use crate::activity::record_activity;
use crate::app_state::AppState;

#[derive(Debug, Serialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub number: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub date: DateTime<Utc>,
    pub value: BigDecimal,
    pub supplier: Option<String>,
    pub status: String,
    pub file_name: String,
    pub file_size: i64,
    pub created_at: DateTime<Utc>,
}

const INVOICE_COLUMNS: &str =
    "id, number, type, date, value, supplier, status, file_name, file_size, created_at";

#[derive(Deserialize)]
pub struct InvoiceFilter {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

pub async fn list_invoices(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(filter): Query<InvoiceFilter>,
) -> ApiResult<Json<Vec<Invoice>>> {
    let invoices = sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {INVOICE_COLUMNS}
         FROM invoices
         WHERE company_id = $1
           AND ($2::text IS NULL OR status = $2)
           AND ($3::text IS NULL OR type = $3)
           AND ($4::timestamptz IS NULL OR date >= $4)
           AND ($5::timestamptz IS NULL OR date <= $5)
         ORDER BY date DESC"
    ))
    .bind(auth.company_id())
    .bind(&filter.status)
    .bind(&filter.kind)
    .bind(filter.start_date)
    .bind(filter.end_date)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    Ok(Json(invoices))
}

struct UploadedFile {
    original_name: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct InvoiceForm {
    number: Option<String>,
    kind: Option<String>,
    date: Option<DateTime<Utc>>,
    value: Option<BigDecimal>,
    supplier: Option<String>,
    file: Option<UploadedFile>,
}

pub async fn upload_invoice(
    State(state): State<AppState>,
    auth: AuthContext,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Invoice>)> {
    let mut form = InvoiceForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::internal(e, auth.trace_id))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let original_name = field.file_name().unwrap_or("invoice.xml").to_string();

                if !original_name.to_ascii_lowercase().ends_with(".xml") {
                    return Err(ApiError::BadRequest {
                        code: "invalid_file_type",
                        trace_id: auth.trace_id,
                        message: Some("Apenas arquivos XML são permitidos".into()),
                    });
                }

                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

                if bytes.len() > state.config.max_upload_bytes {
                    return Err(ApiError::BadRequest {
                        code: "file_too_large",
                        trace_id: auth.trace_id,
                        message: Some("Arquivo excede o limite de 5 MB".into()),
                    });
                }

                form.file = Some(UploadedFile {
                    original_name,
                    bytes: bytes.to_vec(),
                });
            }
            "number" => form.number = Some(read_text(field, auth.trace_id).await?),
            "type" => form.kind = Some(read_text(field, auth.trace_id).await?),
            "date" => {
                let raw = read_text(field, auth.trace_id).await?;
                let parsed = DateTime::parse_from_rfc3339(&raw)
                    .map(|d| d.with_timezone(&Utc))
                    .map_err(|_| ApiError::bad_request("invalid_date", auth.trace_id))?;
                form.date = Some(parsed);
            }
            "value" => {
                let raw = read_text(field, auth.trace_id).await?;
                let parsed = BigDecimal::from_str(raw.trim())
                    .map_err(|_| ApiError::bad_request("invalid_value", auth.trace_id))?;
                form.value = Some(normalize_scale(&parsed));
            }
            "supplier" => form.supplier = Some(read_text(field, auth.trace_id).await?),
            _ => {}
        }
    }

    let file = form
        .file
        .ok_or(ApiError::bad_request("file_required", auth.trace_id))?;
    let number = form
        .number
        .ok_or(ApiError::bad_request("number_required", auth.trace_id))?;
    let kind = form
        .kind
        .ok_or(ApiError::bad_request("type_required", auth.trace_id))?;
    let date = form
        .date
        .ok_or(ApiError::bad_request("date_required", auth.trace_id))?;
    let value = form
        .value
        .ok_or(ApiError::bad_request("value_required", auth.trace_id))?;

    // One directory per company so a tenant's files never share a namespace.
    let company_dir = state.config.upload_dir.join(auth.company_id().to_string());
    tokio::fs::create_dir_all(&company_dir)
        .await
        .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    let stored_name = format!("file-{}.xml", Uuid::new_v4());
    let file_path = company_dir.join(&stored_name);
    let file_size = file.bytes.len() as i64;

    tokio::fs::write(&file_path, &file.bytes)
        .await
        .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    let created = sqlx::query_as::<_, Invoice>(&format!(
        "INSERT INTO invoices (id, company_id, number, type, date, value, supplier, status, file_name, file_size, file_path)
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9, $10)
         RETURNING {INVOICE_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(auth.company_id())
    .bind(&number)
    .bind(&kind)
    .bind(date)
    .bind(&value)
    .bind(&form.supplier)
    .bind(&file.original_name)
    .bind(file_size)
    .bind(file_path.to_string_lossy().into_owned())
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    record_activity(
        &state.db,
        &state.metrics,
        auth.company_id(),
        auth.user_id(),
        "upload_invoice",
        format!("Nota fiscal {} foi enviada", created.number),
        "file-upload",
        "green",
    )
    .await;

    Ok((StatusCode::CREATED, Json(created)))
}

async fn read_text(field: axum::extract::multipart::Field<'_>, trace_id: Option<Uuid>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::internal(e, trace_id))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Invoice>> {
    let invoice = fetch_owned_invoice(&state, &auth, id).await?;
    Ok(Json(invoice.invoice))
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

pub async fn update_invoice_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusUpdate>,
) -> ApiResult<Json<Invoice>> {
    const ALLOWED: [&str; 3] = ["pending", "processed", "error"];
    if !ALLOWED.contains(&payload.status.as_str()) {
        return Err(ApiError::bad_request("invalid_status", auth.trace_id));
    }

    let existing = fetch_owned_invoice(&state, &auth, id).await?;

    let updated = sqlx::query_as::<_, Invoice>(&format!(
        "UPDATE invoices SET status = $2 WHERE id = $1 RETURNING {INVOICE_COLUMNS}"
    ))
    .bind(id)
    .bind(&payload.status)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    record_activity(
        &state.db,
        &state.metrics,
        auth.company_id(),
        auth.user_id(),
        "update_invoice",
        format!(
            "Status da nota fiscal {} alterado para {}",
            existing.invoice.number, payload.status
        ),
        "file-edit",
        "blue",
    )
    .await;

    Ok(Json(updated))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    ensure_role(&auth, Role::Admin)
        .map_err(|e| ApiError::missing_role(e.required_label(), auth.trace_id))?;

    let existing = fetch_owned_invoice(&state, &auth, id).await?;

    sqlx::query("DELETE FROM invoices WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    // Best-effort: the row is the source of truth, an orphaned file on disk
    // is only wasted space.
    if let Err(err) = tokio::fs::remove_file(&existing.file_path).await {
        warn!(?err, invoice_id = %id, "Failed to remove invoice file");
    }

    record_activity(
        &state.db,
        &state.metrics,
        auth.company_id(),
        auth.user_id(),
        "delete_invoice",
        format!("Nota fiscal {} foi excluída", existing.invoice.number),
        "file-minus",
        "red",
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn download_invoice(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let existing = fetch_owned_invoice(&state, &auth, id).await?;

    let bytes = tokio::fs::read(&existing.file_path)
        .await
        .map_err(|_| ApiError::NotFound {
            code: "invoice_file_not_found",
            trace_id: auth.trace_id,
        })?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/xml"),
    );
    let disposition = format!(
        "attachment; filename=\"{}\"",
        existing.invoice.file_name.replace('"', "")
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition)
            .map_err(|e| ApiError::internal(e, auth.trace_id))?,
    );

    let mut response = Response::new(Body::from(bytes));
    response.headers_mut().extend(headers);
    Ok(response)
}

struct OwnedInvoice {
    invoice: Invoice,
    file_path: PathBuf,
}

/// Load an invoice and refuse foreign tenants with 403, matching the product
/// lookups.
async fn fetch_owned_invoice(
    state: &AppState,
    auth: &AuthContext,
    id: Uuid,
) -> ApiResult<OwnedInvoice> {
    #[derive(FromRow)]
    struct Row {
        #[sqlx(flatten)]
        invoice: Invoice,
        company_id: Uuid,
        file_path: String,
    }

    let row = sqlx::query_as::<_, Row>(&format!(
        "SELECT {INVOICE_COLUMNS}, company_id, file_path FROM invoices WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    let row = row.ok_or(ApiError::NotFound {
        code: "invoice_not_found",
        trace_id: auth.trace_id,
    })?;

    if row.company_id != auth.company_id() {
        return Err(ApiError::Forbidden {
            trace_id: auth.trace_id,
        });
    }

    Ok(OwnedInvoice {
        invoice: row.invoice,
        file_path: PathBuf::from(row.file_path),
    })
}
