use crate::extractors::AuthContext;
use crate::roles::Role;
use tracing::warn;

#[derive(Debug, Clone)]
pub enum GuardError {
    Forbidden { required: Vec<Role> },
}

impl GuardError {
    pub fn required_label(&self) -> String {
        match self {
            GuardError::Forbidden { required } => required
                .iter()
                .map(Role::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Require the authenticated user to hold exactly `required`.
pub fn ensure_role(auth: &AuthContext, required: Role) -> Result<(), GuardError> {
    if auth.claims.role == required {
        return Ok(());
    }
    warn!(
        company_id = %auth.company_id(),
        user_id = %auth.user_id(),
        required = %required,
        actual = %auth.claims.role,
        "role_check_failed"
    );
    Err(GuardError::Forbidden {
        required: vec![required],
    })
}

/// Require the authenticated user to hold one of `required`.
pub fn ensure_any_role(auth: &AuthContext, required: &[Role]) -> Result<(), GuardError> {
    if required.iter().any(|role| auth.claims.role == *role) {
        return Ok(());
    }
    warn!(
        company_id = %auth.company_id(),
        user_id = %auth.user_id(),
        ?required,
        actual = %auth.claims.role,
        "any_role_check_failed"
    );
    Err(GuardError::Forbidden {
        required: required.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Claims;
    use chrono::Utc;
    use uuid::Uuid;

    fn auth_with_role(role: Role) -> AuthContext {
        AuthContext {
            claims: Claims {
                subject: Uuid::new_v4(),
                company_id: Uuid::new_v4(),
                role,
                email: "pessoa@empresa.com".into(),
                expires_at: Utc::now() + chrono::Duration::hours(1),
                issued_at: Some(Utc::now()),
                issuer: "workbox".into(),
            },
            token: "test-token".into(),
            trace_id: None,
        }
    }

    #[test]
    fn exact_role_passes() {
        let auth = auth_with_role(Role::Admin);
        assert!(ensure_role(&auth, Role::Admin).is_ok());
        assert!(ensure_role(&auth, Role::Manager).is_err());
    }

    #[test]
    fn any_role_passes_on_membership() {
        let auth = auth_with_role(Role::Manager);
        assert!(ensure_any_role(&auth, &[Role::Admin, Role::Manager]).is_ok());
        assert!(ensure_any_role(&auth, &[Role::Admin]).is_err());
    }

    #[test]
    fn unknown_role_never_passes() {
        let auth = auth_with_role(Role::Unknown("auditor".into()));
        assert!(ensure_any_role(&auth, &[Role::Admin, Role::Manager, Role::User]).is_err());
    }
}
