use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use common_auth::AuthContext;
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::activity::record_activity;
use crate::app_state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Inventory,
    Fiscal,
    Users,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Inventory => "inventory",
            ReportType::Fiscal => "fiscal",
            ReportType::Users => "users",
        }
    }

    fn display_name(&self) -> &'static str {
        match self {
            ReportType::Inventory => "Estoque",
            ReportType::Fiscal => "Fiscal",
            ReportType::Users => "Usuários",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "inventory" => Some(ReportType::Inventory),
            "fiscal" => Some(ReportType::Fiscal),
            "users" => Some(ReportType::Users),
            _ => None,
        }
    }
}

fn period_display_name(period: &str) -> Option<&'static str> {
    match period {
        "today" => Some("Hoje"),
        "week" => Some("Esta Semana"),
        "month" => Some("Este Mês"),
        "quarter" => Some("Este Trimestre"),
        "year" => Some("Este Ano"),
        "custom" => Some("Período Personalizado"),
        _ => None,
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct InventoryLine {
    pub name: String,
    pub category: String,
    pub stock: i32,
    pub minimum: i32,
    pub price: BigDecimal,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct FiscalLine {
    pub number: String,
    pub date: DateTime<Utc>,
    pub value: BigDecimal,
    pub status: String,
    pub supplier: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct UserLine {
    pub name: String,
    pub email: String,
    pub role: String,
    pub department: Option<String>,
    pub last_access: Option<DateTime<Utc>>,
    pub status: String,
}

const EMPTY_ROW: &str = "Nenhum valor encontrado";

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn render_inventory_csv(lines: &[InventoryLine]) -> String {
    let mut csv = String::from("Nome,Categoria,Estoque,Mínimo,Preço,Status\n");
    if lines.is_empty() {
        csv.push_str(EMPTY_ROW);
        csv.push_str(",,,,,\n");
        return csv;
    }
    for line in lines {
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            csv_field(&line.name),
            csv_field(&line.category),
            line.stock,
            line.minimum,
            line.price,
            line.status,
        ));
    }
    csv
}

pub fn render_fiscal_csv(lines: &[FiscalLine]) -> String {
    let mut csv = String::from("Número,Data,Valor,Status,Fornecedor,Tipo\n");
    if lines.is_empty() {
        csv.push_str(EMPTY_ROW);
        csv.push_str(",,,,,\n");
        return csv;
    }
    for line in lines {
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            csv_field(&line.number),
            line.date.format("%Y-%m-%d"),
            line.value,
            line.status,
            csv_field(line.supplier.as_deref().unwrap_or("")),
            csv_field(&line.kind),
        ));
    }
    csv
}

pub fn render_users_csv(lines: &[UserLine]) -> String {
    let mut csv = String::from("Nome,Email,Cargo,Departamento,Último Acesso,Status\n");
    if lines.is_empty() {
        csv.push_str(EMPTY_ROW);
        csv.push_str(",,,,,\n");
        return csv;
    }
    for line in lines {
        let last_access = line
            .last_access
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            csv_field(&line.name),
            csv_field(&line.email),
            line.role,
            csv_field(line.department.as_deref().unwrap_or("")),
            last_access,
            line.status,
        ));
    }
    csv
}

#[derive(Deserialize)]
pub struct GenerateReport {
    #[serde(rename = "type")]
    pub kind: ReportType,
    pub period: String,
}

#[derive(Debug, Serialize)]
pub struct ReportPayload {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub period: String,
    pub file_name: String,
    pub file_size: i64,
    pub created_at: DateTime<Utc>,
    pub data: serde_json::Value,
    pub csv_content: String,
}

pub async fn generate_report(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<GenerateReport>,
) -> ApiResult<(StatusCode, Json<ReportPayload>)> {
    let period_name = period_display_name(&payload.period)
        .ok_or(ApiError::bad_request("invalid_period", auth.trace_id))?;
    let report_name = format!("{} - {}", payload.kind.display_name(), period_name);

    let timer = state.metrics.report_generation_seconds.start_timer();

    let (data, csv_content) = match payload.kind {
        ReportType::Inventory => {
            let lines = sqlx::query_as::<_, InventoryLine>(
                "SELECT name, category, stock, minimum, price, status::text AS status
                 FROM products WHERE company_id = $1 ORDER BY name",
            )
            .bind(auth.company_id())
            .fetch_all(&state.db)
            .await
            .map_err(|e| ApiError::internal(e, auth.trace_id))?;

            let csv = render_inventory_csv(&lines);
            let data =
                serde_json::to_value(&lines).map_err(|e| ApiError::internal(e, auth.trace_id))?;
            (data, csv)
        }
        ReportType::Fiscal => {
            let lines = sqlx::query_as::<_, FiscalLine>(
                "SELECT number, date, value, status, supplier, type
                 FROM invoices WHERE company_id = $1 ORDER BY date DESC",
            )
            .bind(auth.company_id())
            .fetch_all(&state.db)
            .await
            .map_err(|e| ApiError::internal(e, auth.trace_id))?;

            let csv = render_fiscal_csv(&lines);
            let data =
                serde_json::to_value(&lines).map_err(|e| ApiError::internal(e, auth.trace_id))?;
            (data, csv)
        }
        ReportType::Users => {
            let lines = sqlx::query_as::<_, UserLine>(
                "SELECT name, email, role, department, last_access, status
                 FROM users WHERE company_id = $1 ORDER BY name",
            )
            .bind(auth.company_id())
            .fetch_all(&state.db)
            .await
            .map_err(|e| ApiError::internal(e, auth.trace_id))?;

            let csv = render_users_csv(&lines);
            let data =
                serde_json::to_value(&lines).map_err(|e| ApiError::internal(e, auth.trace_id))?;
            (data, csv)
        }
    };

    let file_name = format!(
        "relatorio_{}_{}.csv",
        payload.kind.as_str(),
        Utc::now().format("%Y-%m-%d")
    );
    let file_size = csv_content.len() as i64;

    #[derive(FromRow)]
    struct Inserted {
        id: Uuid,
        created_at: DateTime<Utc>,
    }

    let inserted = sqlx::query_as::<_, Inserted>(
        "INSERT INTO reports (id, company_id, name, type, period, data, file_name, file_size)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING id, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(auth.company_id())
    .bind(&report_name)
    .bind(payload.kind.as_str())
    .bind(&payload.period)
    .bind(&data)
    .bind(&file_name)
    .bind(file_size)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    timer.observe_duration();
    state
        .metrics
        .reports_generated_total
        .with_label_values(&[payload.kind.as_str()])
        .inc();

    record_activity(
        &state.db,
        &state.metrics,
        auth.company_id(),
        auth.user_id(),
        "generate_report",
        format!("Relatório {report_name} foi gerado"),
        "file-chart",
        "green",
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(ReportPayload {
            id: inserted.id,
            name: report_name,
            kind: payload.kind.as_str().to_string(),
            period: payload.period,
            file_name,
            file_size,
            created_at: inserted.created_at,
            data,
            csv_content,
        }),
    ))
}

#[derive(Debug, Serialize, FromRow)]
pub struct ReportSummary {
    pub id: Uuid,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub period: String,
    pub file_name: String,
    pub file_size: i64,
    pub created_at: DateTime<Utc>,
}

pub async fn list_reports(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<ReportSummary>>> {
    let reports = sqlx::query_as::<_, ReportSummary>(
        "SELECT id, name, type, period, file_name, file_size, created_at
         FROM reports
         WHERE company_id = $1
         ORDER BY created_at DESC",
    )
    .bind(auth.company_id())
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    Ok(Json(reports))
}

pub async fn get_report(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReportPayload>> {
    #[derive(FromRow)]
    struct Row {
        id: Uuid,
        name: String,
        #[sqlx(rename = "type")]
        kind: String,
        period: String,
        data: serde_json::Value,
        file_name: String,
        file_size: i64,
        created_at: DateTime<Utc>,
    }

    // Tenant scoping happens in the query itself, so a foreign report id is
    // indistinguishable from a missing one.
    let row = sqlx::query_as::<_, Row>(
        "SELECT id, name, type, period, data, file_name, file_size, created_at
         FROM reports
         WHERE id = $1 AND company_id = $2",
    )
    .bind(id)
    .bind(auth.company_id())
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    let row = row.ok_or(ApiError::NotFound {
        code: "report_not_found",
        trace_id: auth.trace_id,
    })?;

    let kind = ReportType::parse(&row.kind).ok_or_else(|| {
        ApiError::internal(
            format!("Report {} has unknown type {}", row.id, row.kind),
            auth.trace_id,
        )
    })?;

    let csv_content = rerender_csv(kind, &row.data, auth.trace_id)?;

    Ok(Json(ReportPayload {
        id: row.id,
        name: row.name,
        kind: row.kind,
        period: row.period,
        file_name: row.file_name,
        file_size: row.file_size,
        created_at: row.created_at,
        data: row.data,
        csv_content,
    }))
}

/// Rebuild the CSV from the persisted snapshot, never from live tables: the
/// report stays frozen at generation time.
fn rerender_csv(
    kind: ReportType,
    data: &serde_json::Value,
    trace_id: Option<Uuid>,
) -> ApiResult<String> {
    let csv = match kind {
        ReportType::Inventory => {
            let lines: Vec<InventoryLine> = serde_json::from_value(data.clone())
                .map_err(|e| ApiError::internal(e, trace_id))?;
            render_inventory_csv(&lines)
        }
        ReportType::Fiscal => {
            let lines: Vec<FiscalLine> = serde_json::from_value(data.clone())
                .map_err(|e| ApiError::internal(e, trace_id))?;
            render_fiscal_csv(&lines)
        }
        ReportType::Users => {
            let lines: Vec<UserLine> = serde_json::from_value(data.clone())
                .map_err(|e| ApiError::internal(e, trace_id))?;
            render_users_csv(&lines)
        }
    };
    Ok(csv)
}

pub async fn delete_report(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let result = sqlx::query("DELETE FROM reports WHERE id = $1 AND company_id = $2")
        .bind(id)
        .bind(auth.company_id())
        .execute(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, auth.trace_id))?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound {
            code: "report_not_found",
            trace_id: auth.trace_id,
        });
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn inventory_csv_has_headers_and_rows() {
        let lines = vec![InventoryLine {
            name: "Parafuso M4".into(),
            category: "Fixadores".into(),
            stock: 12,
            minimum: 10,
            price: BigDecimal::from_str("0.35").unwrap(),
            status: "normal".into(),
        }];
        let csv = render_inventory_csv(&lines);
        let mut rows = csv.lines();
        assert_eq!(rows.next(), Some("Nome,Categoria,Estoque,Mínimo,Preço,Status"));
        assert_eq!(rows.next(), Some("Parafuso M4,Fixadores,12,10,0.35,normal"));
        assert_eq!(rows.next(), None);
    }

    #[test]
    fn empty_report_renders_placeholder_row() {
        let csv = render_inventory_csv(&[]);
        assert!(csv.contains("Nenhum valor encontrado"));
    }

    #[test]
    fn csv_fields_with_commas_are_quoted() {
        let lines = vec![UserLine {
            name: "Silva, Ana".into(),
            email: "ana@empresa.com".into(),
            role: "manager".into(),
            department: None,
            last_access: None,
            status: "active".into(),
        }];
        let csv = render_users_csv(&lines);
        assert!(csv.contains("\"Silva, Ana\",ana@empresa.com"));
    }

    #[test]
    fn fiscal_dates_render_as_day_precision() {
        let lines = vec![FiscalLine {
            number: "NF-123".into(),
            date: DateTime::parse_from_rfc3339("2024-03-05T14:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
            value: BigDecimal::from_str("199.90").unwrap(),
            status: "pending".into(),
            supplier: Some("Fornecedor A".into()),
            kind: "entrada".into(),
        }];
        let csv = render_fiscal_csv(&lines);
        assert!(csv.contains("NF-123,2024-03-05,199.90,pending,Fornecedor A,entrada"));
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let lines = vec![InventoryLine {
            name: "Cabo HDMI".into(),
            category: "Eletrônicos".into(),
            stock: 3,
            minimum: 10,
            price: BigDecimal::from_str("29.90").unwrap(),
            status: "critical".into(),
        }];
        let value = serde_json::to_value(&lines).unwrap();
        let back: Vec<InventoryLine> = serde_json::from_value(value).unwrap();
        assert_eq!(render_inventory_csv(&lines), render_inventory_csv(&back));
    }

    #[test]
    fn unknown_period_is_rejected() {
        assert!(period_display_name("fortnight").is_none());
        assert_eq!(period_display_name("month"), Some("Este Mês"));
    }
}
