use std::sync::Arc;

use axum::extract::FromRef;
use common_auth::JwtVerifier;
use common_observability::WorkboxMetrics;
use sqlx::PgPool;

use crate::config::ServiceConfig;
use crate::stock::StockPolicy;
use crate::tokens::TokenSigner;

/// Shared application state used by handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub jwt_verifier: Arc<JwtVerifier>,
    pub token_signer: Arc<TokenSigner>,
    pub config: Arc<ServiceConfig>,
    pub metrics: Arc<WorkboxMetrics>,
    pub stock_policy: StockPolicy,
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_verifier.clone()
    }
}

impl FromRef<AppState> for Arc<TokenSigner> {
    fn from_ref(state: &AppState) -> Self {
        state.token_signer.clone()
    }
}
