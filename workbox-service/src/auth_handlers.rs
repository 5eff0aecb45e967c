use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::{error, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::tokens::{IssuedTokens, TokenSubject};

const MAX_FAILED_ATTEMPTS: i16 = 5;
const LOCKOUT_MINUTES: i64 = 15;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    locked_until: Option<String>,
}

#[derive(Debug)]
pub struct AuthError {
    status: StatusCode,
    body: ErrorResponse,
}

impl AuthError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                code,
                message: message.into(),
                locked_until: None,
            },
        }
    }

    fn invalid_credentials() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "INVALID_CREDENTIALS",
            "Credenciais inválidas.",
        )
    }

    fn inactive_account() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "ACCOUNT_INACTIVE",
            "Usuário inativo. Contate o administrador.",
        )
    }

    fn account_locked(until: Option<DateTime<Utc>>) -> Self {
        let locked_until = until.map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, true));
        let mut error = Self::new(
            StatusCode::LOCKED,
            "ACCOUNT_LOCKED",
            "Conta bloqueada por tentativas repetidas. Tente novamente mais tarde.",
        );
        error.body.locked_until = locked_until;
        error
    }

    fn invalid_refresh() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "INVALID_REFRESH_TOKEN",
            "Token de atualização inválido ou expirado.",
        )
    }

    fn internal_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "SERVER_ERROR", message)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, FromRow)]
pub struct SessionCompany {
    pub id: Uuid,
    pub name: String,
    pub logo: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub avatar: Option<String>,
    pub company: SessionCompany,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
    pub token_type: &'static str,
    pub access_token_expires_at: String,
    pub refresh_token_expires_at: String,
    pub user: SessionUser,
}

#[derive(FromRow)]
struct AuthRow {
    id: Uuid,
    company_id: Uuid,
    name: String,
    email: String,
    role: String,
    status: String,
    avatar: Option<String>,
    password_hash: String,
    failed_attempts: i16,
    locked_until: Option<DateTime<Utc>>,
    company_name: String,
    company_logo: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    Json(login): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let LoginRequest { email, password } = login;

    let mut auth_data = match sqlx::query_as::<_, AuthRow>(
        "SELECT u.id, u.company_id, u.name, u.email, u.role, u.status, u.avatar,
                u.password_hash, u.failed_attempts, u.locked_until,
                c.name AS company_name, c.logo AS company_logo
         FROM users u
         JOIN companies c ON c.id = u.company_id
         WHERE u.email = $1",
    )
    .bind(&email)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| AuthError::internal_error(format!("DB query failed: {e}")))?
    {
        Some(row) => row,
        None => {
            state.metrics.login_attempts_total.with_label_values(&["invalid"]).inc();
            return Err(AuthError::invalid_credentials());
        }
    };

    let now = Utc::now();

    if let Some(locked_until) = auth_data.locked_until {
        if locked_until > now {
            state.metrics.login_attempts_total.with_label_values(&["locked"]).inc();
            return Err(AuthError::account_locked(Some(locked_until)));
        }

        if auth_data.failed_attempts >= MAX_FAILED_ATTEMPTS {
            if let Err(err) = sqlx::query(
                "UPDATE users SET failed_attempts = 0, locked_until = NULL WHERE id = $1",
            )
            .bind(auth_data.id)
            .execute(&state.db)
            .await
            {
                warn!(user_id = %auth_data.id, error = ?err, "Failed to reset expired lockout");
            } else {
                auth_data.failed_attempts = 0;
                auth_data.locked_until = None;
            }
        }
    }

    let password_valid = match PasswordHash::new(&auth_data.password_hash) {
        Ok(parsed_hash) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok(),
        Err(_) => false,
    };

    if !password_valid {
        let new_attempts = auth_data.failed_attempts.saturating_add(1);
        let lock_until = if new_attempts >= MAX_FAILED_ATTEMPTS {
            Some(now + Duration::minutes(LOCKOUT_MINUTES))
        } else {
            None
        };

        if let Err(err) =
            sqlx::query("UPDATE users SET failed_attempts = $1, locked_until = $2 WHERE id = $3")
                .bind(new_attempts)
                .bind(lock_until)
                .bind(auth_data.id)
                .execute(&state.db)
                .await
        {
            warn!(
                user_id = %auth_data.id,
                error = ?err,
                "Failed to record failed login attempt"
            );
        }

        state.metrics.login_attempts_total.with_label_values(&["invalid"]).inc();

        if let Some(until) = lock_until {
            return Err(AuthError::account_locked(Some(until)));
        }

        return Err(AuthError::invalid_credentials());
    }

    if auth_data.status != "active" {
        state.metrics.login_attempts_total.with_label_values(&["inactive"]).inc();
        return Err(AuthError::inactive_account());
    }

    if let Err(err) = sqlx::query(
        "UPDATE users SET failed_attempts = 0, locked_until = NULL, last_access = $1 WHERE id = $2",
    )
    .bind(now)
    .bind(auth_data.id)
    .execute(&state.db)
    .await
    {
        warn!(
            user_id = %auth_data.id,
            error = ?err,
            "Failed to record last access after successful login"
        );
    }

    let subject = TokenSubject {
        user_id: auth_data.id,
        company_id: auth_data.company_id,
        role: auth_data.role.clone(),
        email: auth_data.email.clone(),
    };

    let issued = state.token_signer.issue_tokens(subject).await.map_err(|err| {
        error!(user_id = %auth_data.id, error = ?err, "Failed to issue tokens");
        AuthError::internal_error("Não foi possível emitir os tokens de autenticação.")
    })?;

    state.metrics.login_attempts_total.with_label_values(&["success"]).inc();

    Ok(Json(session_response(
        issued,
        SessionUser {
            id: auth_data.id,
            name: auth_data.name,
            email: auth_data.email,
            role: auth_data.role,
            avatar: auth_data.avatar,
            company: SessionCompany {
                id: auth_data.company_id,
                name: auth_data.company_name,
                logo: auth_data.company_logo,
            },
        },
    )))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let account = state
        .token_signer
        .consume_refresh_token(&request.refresh_token)
        .await
        .map_err(|err| {
            error!(error = ?err, "Failed to consume refresh token");
            AuthError::internal_error("Não foi possível renovar a sessão.")
        })?;

    let account = match account {
        Some(account) => account,
        None => return Err(AuthError::invalid_refresh()),
    };

    if account.status != "active" {
        return Err(AuthError::inactive_account());
    }

    let company = sqlx::query_as::<_, SessionCompany>(
        "SELECT id, name, logo FROM companies WHERE id = $1",
    )
    .bind(account.company_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| AuthError::internal_error(format!("DB query failed: {e}")))?;

    let subject = TokenSubject {
        user_id: account.user_id,
        company_id: account.company_id,
        role: account.role.clone(),
        email: account.email.clone(),
    };

    let issued = state.token_signer.issue_tokens(subject).await.map_err(|err| {
        error!(user_id = %account.user_id, error = ?err, "Failed to reissue tokens");
        AuthError::internal_error("Não foi possível renovar a sessão.")
    })?;

    Ok(Json(session_response(
        issued,
        SessionUser {
            id: account.user_id,
            name: account.name,
            email: account.email,
            role: account.role,
            avatar: None,
            company,
        },
    )))
}

#[derive(Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub revoked: bool,
}

pub async fn logout(
    State(state): State<AppState>,
    Json(request): Json<LogoutRequest>,
) -> Result<Json<LogoutResponse>, AuthError> {
    let revoked = state
        .token_signer
        .revoke_refresh_token(&request.refresh_token)
        .await
        .map_err(|err| {
            error!(error = ?err, "Failed to revoke refresh token");
            AuthError::internal_error("Não foi possível encerrar a sessão.")
        })?;

    Ok(Json(LogoutResponse { revoked }))
}

fn session_response(issued: IssuedTokens, user: SessionUser) -> LoginResponse {
    let IssuedTokens {
        access_token,
        refresh_token,
        access_expires_at,
        refresh_expires_at,
        access_expires_in,
        refresh_expires_in,
        token_type,
    } = issued;

    LoginResponse {
        access_token,
        refresh_token,
        expires_in: access_expires_in,
        refresh_expires_in,
        token_type,
        access_token_expires_at: access_expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        refresh_token_expires_at: refresh_expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        user,
    }
}

pub(crate) fn hash_password(password: &str) -> Result<String, (StatusCode, String)> {
    if password.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Password must not be empty".to_string(),
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to hash password: {err}"),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::PasswordHash;

    #[test]
    fn hash_password_produces_verifiable_phc_string() {
        let hash = hash_password("senha-secreta").expect("hash");
        let parsed = PasswordHash::new(&hash).expect("valid PHC string");
        assert!(Argon2::default()
            .verify_password(b"senha-secreta", &parsed)
            .is_ok());
        assert!(Argon2::default()
            .verify_password(b"senha-errada", &parsed)
            .is_err());
    }

    #[test]
    fn hash_password_rejects_empty_input() {
        let err = hash_password("   ").expect_err("should reject");
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }
}
