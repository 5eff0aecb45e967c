use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::roles::Role;

/// Application-focused representation of verified JWT claims.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    pub subject: Uuid,
    pub company_id: Uuid,
    pub role: Role,
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    pub issuer: String,
}

impl Claims {
    pub fn has_role(&self, role: &Role) -> bool {
        self.role == *role
    }
}

#[derive(Debug, Deserialize)]
struct ClaimsRepr {
    sub: String,
    #[serde(rename = "cid")]
    company_id: String,
    role: String,
    #[serde(default)]
    email: String,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
    iss: String,
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        let subject = Uuid::parse_str(&value.sub)
            .map_err(|_| AuthError::InvalidClaim("sub", value.sub.clone()))?;
        let company_id = Uuid::parse_str(&value.company_id)
            .map_err(|_| AuthError::InvalidClaim("cid", value.company_id.clone()))?;

        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", value.exp.to_string()))?;

        let issued_at = match value.iat {
            Some(iat) => Some(
                Utc.timestamp_opt(iat, 0)
                    .single()
                    .ok_or_else(|| AuthError::InvalidClaim("iat", iat.to_string()))?,
            ),
            None => None,
        };

        let role = value
            .role
            .parse::<Role>()
            .unwrap_or(Role::Unknown(value.role));

        Ok(Self {
            subject,
            company_id,
            role,
            email: value.email,
            expires_at,
            issued_at,
            issuer: value.iss,
        })
    }
}

impl TryFrom<serde_json::Value> for Claims {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        let repr: ClaimsRepr = serde_json::from_value(value)
            .map_err(|err| AuthError::InvalidJson(err.to_string()))?;
        Claims::try_from(repr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_payload() {
        let subject = Uuid::new_v4();
        let company = Uuid::new_v4();
        let payload = json!({
            "sub": subject.to_string(),
            "cid": company.to_string(),
            "role": "manager",
            "email": "gerente@empresa.com",
            "exp": 1_900_000_000i64,
            "iat": 1_899_996_400i64,
            "iss": "workbox",
        });

        let claims = Claims::try_from(payload).expect("claims parse");
        assert_eq!(claims.subject, subject);
        assert_eq!(claims.company_id, company);
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.email, "gerente@empresa.com");
        assert_eq!(claims.issuer, "workbox");
    }

    #[test]
    fn rejects_malformed_company_id() {
        let payload = json!({
            "sub": Uuid::new_v4().to_string(),
            "cid": "not-a-uuid",
            "role": "admin",
            "exp": 1_900_000_000i64,
            "iss": "workbox",
        });

        let err = Claims::try_from(payload).expect_err("should reject");
        assert!(matches!(err, AuthError::InvalidClaim("cid", _)));
    }
}
