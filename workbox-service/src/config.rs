use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub low_stock_margin_units: i32,
}

pub fn load_service_config() -> Result<ServiceConfig> {
    let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
    if jwt_secret.trim().is_empty() {
        return Err(anyhow!("JWT_SECRET must not be empty"));
    }

    let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "workbox".to_string());

    let access_ttl_seconds = i64_from_env("AUTH_ACCESS_TTL_SECONDS")?.unwrap_or(3_600);
    let refresh_ttl_seconds = i64_from_env("AUTH_REFRESH_TTL_SECONDS")?.unwrap_or(604_800);

    let upload_dir = env::var("UPLOAD_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("uploads"));

    let max_upload_bytes = i64_from_env("INVOICE_MAX_UPLOAD_BYTES")?
        .unwrap_or(5 * 1024 * 1024)
        .try_into()
        .context("INVOICE_MAX_UPLOAD_BYTES must be positive")?;

    // Margin below or equal to which a product counts as Low beyond its
    // minimum. 0 reproduces the strict at-or-below-minimum rule; the legacy
    // deployments used 5.
    let low_stock_margin_units = i64_from_env("STOCK_LOW_MARGIN_UNITS")?
        .unwrap_or(0)
        .clamp(0, i32::MAX as i64) as i32;

    Ok(ServiceConfig {
        jwt_secret,
        jwt_issuer,
        access_ttl_seconds,
        refresh_ttl_seconds,
        upload_dir,
        max_upload_bytes,
        low_stock_margin_units,
    })
}

fn i64_from_env(key: &str) -> Result<Option<i64>> {
    match env::var(key) {
        Ok(value) => {
            let parsed = value
                .trim()
                .parse::<i64>()
                .map_err(|err| anyhow!("Invalid {key} value '{value}': {err}"))?;
            Ok(Some(parsed))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i64_from_env_parses_and_rejects() {
        std::env::set_var("TEST_I64_OK", "42");
        std::env::set_var("TEST_I64_BAD", "not-a-number");
        assert_eq!(i64_from_env("TEST_I64_OK").unwrap(), Some(42));
        assert!(i64_from_env("TEST_I64_BAD").is_err());
        assert_eq!(i64_from_env("TEST_I64_ABSENT").unwrap(), None);
    }
}
