use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of roles a WorkBox account can hold. Tokens minted by older
/// deployments may carry labels outside this set; those are preserved in
/// `Unknown` so guards can reject them without losing the original value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Manager,
    User,
    Unknown(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::User => "user",
            Role::Unknown(other) => other.as_str(),
        }
    }

    /// Roles entitled to receive stock alert notifications.
    pub fn receives_stock_alerts(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "manager" => Role::Manager,
            "user" => Role::User,
            _ => Role::Unknown(s.trim().to_string()),
        })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_roles_case_insensitively() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("MANAGER".parse::<Role>().unwrap(), Role::Manager);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
    }

    #[test]
    fn preserves_unknown_labels() {
        let role = "auditor".parse::<Role>().unwrap();
        assert_eq!(role, Role::Unknown("auditor".to_string()));
        assert_eq!(role.as_str(), "auditor");
    }

    #[test]
    fn alert_entitlement_covers_admin_and_manager_only() {
        assert!(Role::Admin.receives_stock_alerts());
        assert!(Role::Manager.receives_stock_alerts());
        assert!(!Role::User.receives_stock_alerts());
        assert!(!Role::Unknown("auditor".into()).receives_stock_alerts());
    }
}
