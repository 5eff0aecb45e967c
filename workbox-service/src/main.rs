use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use common_auth::{JwtConfig, JwtVerifier};
use common_observability::WorkboxMetrics;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::info;

use workbox_service::app_state::AppState;
use workbox_service::config::load_service_config;
use workbox_service::router::build_router;
use workbox_service::stock::StockPolicy;
use workbox_service::tokens::{TokenConfig, TokenSigner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = load_service_config()?;

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db = PgPool::connect(&database_url).await?;
    // Ensure database schema is up to date before serving traffic
    sqlx::migrate!("./migrations").run(&db).await?;

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let jwt_verifier = Arc::new(JwtVerifier::new(
        JwtConfig::new(config.jwt_issuer.clone()),
        config.jwt_secret.as_bytes(),
    ));
    let token_signer = Arc::new(TokenSigner::new(
        db.clone(),
        TokenConfig {
            issuer: config.jwt_issuer.clone(),
            access_ttl_seconds: config.access_ttl_seconds,
            refresh_ttl_seconds: config.refresh_ttl_seconds,
        },
        config.jwt_secret.as_bytes(),
    ));

    let stock_policy = StockPolicy {
        low_stock_margin_units: config.low_stock_margin_units,
    };

    let state = AppState {
        db,
        jwt_verifier,
        token_signer,
        config: Arc::new(config),
        metrics: Arc::new(WorkboxMetrics::new()),
        stock_policy,
    };

    let app = build_router(state);

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);
    let ip: std::net::IpAddr = host.parse()?;
    let addr = SocketAddr::from((ip, port));

    info!(%addr, "starting workbox-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
