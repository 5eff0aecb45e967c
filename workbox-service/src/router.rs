use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::activity::list_activities;
use crate::app_state::AppState;
use crate::auth_handlers::{login, logout, refresh};
use crate::company_handlers::{
    create_company, delete_company, get_company, list_companies, update_company,
};
use crate::dashboard_handlers::{recent_activities, stats, stock_alerts, top_products};
use crate::invoice_handlers::{
    delete_invoice, download_invoice, get_invoice, list_invoices, update_invoice_status,
    upload_invoice,
};
use crate::metrics::metrics;
use crate::notification_handlers::{
    delete_notification, list_notifications, mark_all_as_read, mark_as_read,
};
use crate::product_handlers::{
    create_product, delete_product, get_product, list_products, stock_summary, update_product,
};
use crate::report_handlers::{delete_report, generate_report, get_report, list_reports};
use crate::user_handlers::{
    create_user, delete_user, get_user, list_users, my_companies, update_user,
};

async fn health() -> &'static str {
    "ok"
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://localhost:5173"),
        ]))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static("authorization"),
            HeaderName::from_static("x-trace-id"),
        ]);

    let max_upload = state.config.max_upload_bytes;

    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/users", get(list_users).post(create_user))
        .route("/users/me/companies", get(my_companies))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/companies", get(list_companies).post(create_company))
        .route(
            "/companies/:id",
            get(get_company).put(update_company).delete(delete_company),
        )
        .route("/products", get(list_products).post(create_product))
        .route("/products/summary", get(stock_summary))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/invoices", get(list_invoices))
        .route(
            "/invoices/upload",
            post(upload_invoice).layer(DefaultBodyLimit::max(max_upload + 64 * 1024)),
        )
        .route(
            "/invoices/:id",
            get(get_invoice).delete(delete_invoice),
        )
        .route("/invoices/:id/status", put(update_invoice_status))
        .route("/invoices/:id/download", get(download_invoice))
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", put(mark_all_as_read))
        .route(
            "/notifications/:id",
            delete(delete_notification),
        )
        .route("/notifications/:id/read", put(mark_as_read))
        .route("/activities", get(list_activities))
        .route("/dashboard/stats", get(stats))
        .route("/dashboard/activities", get(recent_activities))
        .route("/dashboard/top-products", get(top_products))
        .route("/dashboard/stock-alerts", get(stock_alerts))
        .route("/reports", get(list_reports).post(generate_report))
        .route("/reports/:id", get(get_report).delete(delete_report))
        .with_state(state)
        .layer(cors)
}
