pub mod activity;
pub mod app_state;
pub mod auth_handlers;
pub mod company_handlers;
pub mod config;
pub mod dashboard_handlers;
pub mod invoice_handlers;
pub mod metrics;
pub mod notification_handlers;
pub mod product_handlers;
pub mod report_handlers;
pub mod router;
pub mod stock;
pub mod tokens;
pub mod user_handlers;

pub use common_http_errors::ApiError;
