use anyhow::{anyhow, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rand_core::{OsRng, RngCore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

pub struct TokenConfig {
    pub issuer: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

/// Signs HS256 access tokens and manages single-use refresh tokens.
pub struct TokenSigner {
    pool: PgPool,
    config: TokenConfig,
    encoding_key: EncodingKey,
}

pub struct TokenSubject {
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub role: String,
    pub email: String,
}

/// Account row reconstructed when a refresh token is consumed.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenAccount {
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub expires_at: DateTime<Utc>,
}

pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub access_expires_in: i64,
    pub refresh_expires_in: i64,
    pub token_type: &'static str,
}

#[derive(Serialize)]
struct AccessClaims<'a> {
    sub: String,
    cid: String,
    role: &'a str,
    email: &'a str,
    iss: &'a str,
    exp: i64,
    iat: i64,
    jti: String,
}

impl TokenSigner {
    pub fn new(pool: PgPool, config: TokenConfig, secret: &[u8]) -> Self {
        Self {
            pool,
            config,
            encoding_key: EncodingKey::from_secret(secret),
        }
    }

    pub async fn issue_tokens(&self, subject: TokenSubject) -> Result<IssuedTokens> {
        let now = Utc::now();
        let access_exp = now + Duration::seconds(self.config.access_ttl_seconds);
        let refresh_exp = now + Duration::seconds(self.config.refresh_ttl_seconds);

        let access_claims = AccessClaims {
            sub: subject.user_id.to_string(),
            cid: subject.company_id.to_string(),
            role: &subject.role,
            email: &subject.email,
            iss: &self.config.issuer,
            exp: access_exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &access_claims,
            &self.encoding_key,
        )
        .map_err(|err| anyhow!("Failed to sign access token: {err}"))?;

        let refresh_token = Self::generate_refresh_token();
        let refresh_hash = Self::hash_refresh_token(&refresh_token);
        let refresh_jti = Uuid::new_v4();

        self.persist_refresh_token(refresh_jti, subject.user_id, &refresh_hash, now, refresh_exp)
            .await?;

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            access_expires_at: access_exp,
            refresh_expires_at: refresh_exp,
            access_expires_in: self.config.access_ttl_seconds,
            refresh_expires_in: self.config.refresh_ttl_seconds,
            token_type: "Bearer",
        })
    }

    fn generate_refresh_token() -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let random = URL_SAFE_NO_PAD.encode(bytes);
        format!("{}.{}", Uuid::new_v4(), random)
    }

    fn hash_refresh_token(token: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hasher.finalize().to_vec()
    }

    async fn persist_refresh_token(
        &self,
        jti: Uuid,
        user_id: Uuid,
        token_hash: &[u8],
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO auth_refresh_tokens (jti, user_id, token_hash, issued_at, expires_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(jti)
        .bind(user_id)
        .bind(token_hash)
        .bind(issued_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|err| anyhow!("Failed to persist refresh token: {err}"))
    }

    /// Single-use consumption: the token row is hard-deleted inside the same
    /// transaction that reads it, so a replay finds nothing.
    pub async fn consume_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenAccount>> {
        if token.trim().is_empty() {
            return Ok(None);
        }

        let hash = Self::hash_refresh_token(token);
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, RefreshTokenAccount>(
            "SELECT u.id AS user_id, u.company_id, u.name, u.email, u.role, u.status, r.expires_at
             FROM auth_refresh_tokens r
             JOIN users u ON u.id = r.user_id
             WHERE r.token_hash = $1
             FOR UPDATE OF r",
        )
        .bind(hash.as_slice())
        .fetch_optional(&mut *tx)
        .await?;

        let account = match row {
            Some(account) => {
                sqlx::query("DELETE FROM auth_refresh_tokens WHERE token_hash = $1")
                    .bind(hash.as_slice())
                    .execute(&mut *tx)
                    .await?;
                if account.expires_at <= Utc::now() {
                    None
                } else {
                    Some(account)
                }
            }
            None => None,
        };

        tx.commit().await?;
        Ok(account)
    }

    /// Revoke a refresh token without issuing a replacement (logout).
    pub async fn revoke_refresh_token(&self, token: &str) -> Result<bool> {
        if token.trim().is_empty() {
            return Ok(false);
        }

        let hash = Self::hash_refresh_token(token);
        let result = sqlx::query("DELETE FROM auth_refresh_tokens WHERE token_hash = $1")
            .bind(hash.as_slice())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_tokens_are_unique_and_opaque() {
        let a = TokenSigner::generate_refresh_token();
        let b = TokenSigner::generate_refresh_token();
        assert_ne!(a, b);
        assert!(a.contains('.'));
    }

    #[test]
    fn refresh_hash_is_stable() {
        let token = "some-refresh-token";
        assert_eq!(
            TokenSigner::hash_refresh_token(token),
            TokenSigner::hash_refresh_token(token)
        );
        assert_ne!(
            TokenSigner::hash_refresh_token(token),
            TokenSigner::hash_refresh_token("another-token")
        );
    }
}
