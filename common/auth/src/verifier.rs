use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::debug;

use crate::claims::Claims;
use crate::config::JwtConfig;
use crate::error::AuthResult;

/// Verifies HS256 access tokens signed with the deployment-wide secret.
#[derive(Clone)]
pub struct JwtVerifier {
    config: JwtConfig,
    decoding_key: DecodingKey,
}

impl JwtVerifier {
    pub fn new(config: JwtConfig, secret: &[u8]) -> Self {
        Self {
            config,
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.issuer.clone()]);
        validation.leeway = self.config.leeway_seconds.into();
        validation.validate_aud = false;

        let token_data = decode::<Value>(token, &self.decoding_key, &validation)?;
        let claims = Claims::try_from(token_data.claims)?;
        debug!(subject = %claims.subject, "verified JWT successfully");
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::roles::Role;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;
    use uuid::Uuid;

    const SECRET: &[u8] = b"test-secret";

    #[derive(Serialize)]
    struct TokenClaims<'a> {
        sub: String,
        cid: String,
        role: &'a str,
        email: &'a str,
        iss: &'a str,
        exp: i64,
        iat: i64,
    }

    fn issue_token(issuer: &str, role: &str, exp_offset: i64) -> (String, Uuid, Uuid) {
        let subject = Uuid::new_v4();
        let company = Uuid::new_v4();
        let now = Utc::now().timestamp();

        let claims = TokenClaims {
            sub: subject.to_string(),
            cid: company.to_string(),
            role,
            email: "pessoa@empresa.com",
            iss: issuer,
            exp: now + exp_offset,
            iat: now,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .expect("sign token");

        (token, subject, company)
    }

    #[test]
    fn verifier_accepts_valid_token() {
        let verifier = JwtVerifier::new(JwtConfig::new("workbox"), SECRET);
        let (token, subject, company) = issue_token("workbox", "admin", 600);

        let claims = verifier.verify(&token).expect("verification succeeds");
        assert_eq!(claims.subject, subject);
        assert_eq!(claims.company_id, company);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.issuer, "workbox");
    }

    #[test]
    fn verifier_rejects_wrong_issuer() {
        let verifier = JwtVerifier::new(JwtConfig::new("workbox"), SECRET);
        let (token, _, _) = issue_token("someone-else", "admin", 600);

        let err = verifier.verify(&token).expect_err("should reject issuer");
        assert!(matches!(err, AuthError::Verification(_)));
    }

    #[test]
    fn verifier_rejects_expired_token() {
        let verifier = JwtVerifier::new(JwtConfig::new("workbox").with_leeway(0), SECRET);
        let (token, _, _) = issue_token("workbox", "admin", -600);

        let err = verifier.verify(&token).expect_err("should reject expired");
        assert!(matches!(err, AuthError::Verification(_)));
    }

    #[test]
    fn verifier_rejects_wrong_secret() {
        let verifier = JwtVerifier::new(JwtConfig::new("workbox"), b"other-secret");
        let (token, _, _) = issue_token("workbox", "admin", 600);

        assert!(verifier.verify(&token).is_err());
    }
}
