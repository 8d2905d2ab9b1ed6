//! Credential handling for the ERP login exchange
//!
//! Credentials are read once at process start and are immutable afterwards.
//! The login secret is held in a zeroizing wrapper so it is cleared from
//! memory on drop and never appears in debug output.

use crate::error::{ClientError, Result};
use url::Url;
use zeroize::Zeroize;

/// Login secret with automatic memory clearing
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret with basic validation
    pub fn new(value: String) -> Result<Self> {
        if value.is_empty() {
            return Err(ClientError::Validation(
                "Secret cannot be empty".to_string(),
            ));
        }
        if value.contains('\r') || value.contains('\n') {
            return Err(ClientError::Validation(
                "Secret contains line breaks".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// Get the secret value (limited access)
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl Zeroize for Secret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Connection credentials for the remote ERP server.
///
/// Owned exclusively by the [`Authenticator`](crate::auth::Authenticator);
/// immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct Credentials {
    base_url: Url,
    database: String,
    login: String,
    secret: Secret,
}

impl Credentials {
    /// Environment variable holding the server base URL
    pub const ENV_BASE_URL: &'static str = "ERP_BASE_URL";
    /// Environment variable holding the target database name
    pub const ENV_DATABASE: &'static str = "ERP_DATABASE";
    /// Environment variable holding the login
    pub const ENV_LOGIN: &'static str = "ERP_LOGIN";
    /// Environment variable holding the password
    pub const ENV_PASSWORD: &'static str = "ERP_PASSWORD";

    /// Create credentials with validation
    pub fn new(
        base_url: Url,
        database: impl Into<String>,
        login: impl Into<String>,
        secret: Secret,
    ) -> Result<Self> {
        let database = database.into();
        let login = login.into();

        if database.trim().is_empty() {
            return Err(ClientError::Validation(
                "Database name cannot be empty".to_string(),
            ));
        }
        if login.trim().is_empty() {
            return Err(ClientError::Validation("Login cannot be empty".to_string()));
        }

        Ok(Self {
            base_url,
            database,
            login,
            secret,
        })
    }

    /// Read credentials from the environment.
    ///
    /// Expects `ERP_BASE_URL`, `ERP_DATABASE`, `ERP_LOGIN` and `ERP_PASSWORD`
    /// to be set; intended to be called once at process start.
    pub fn from_env() -> Result<Self> {
        let base_url = read_env(Self::ENV_BASE_URL)?;
        let base_url = Url::parse(&base_url).map_err(|e| {
            ClientError::Validation(format!("{} is not a valid URL: {}", Self::ENV_BASE_URL, e))
        })?;
        let database = read_env(Self::ENV_DATABASE)?;
        let login = read_env(Self::ENV_LOGIN)?;
        let secret = Secret::new(read_env(Self::ENV_PASSWORD)?)?;

        Self::new(base_url, database, login, secret)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn secret(&self) -> &Secret {
        &self.secret
    }
}

fn read_env(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| ClientError::Validation(format!("Environment variable {} is not set", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_url() -> Url {
        Url::parse("https://erp.example.ch").unwrap()
    }

    #[test]
    fn test_credentials_creation() {
        let secret = Secret::new("hunter2hunter2".to_string()).unwrap();
        let creds = Credentials::new(test_url(), "prod_db", "ops@example.ch", secret).unwrap();

        assert_eq!(creds.database(), "prod_db");
        assert_eq!(creds.login(), "ops@example.ch");
        assert_eq!(creds.secret().expose_secret(), "hunter2hunter2");
    }

    #[test]
    fn test_empty_database_rejected() {
        let secret = Secret::new("hunter2hunter2".to_string()).unwrap();
        let result = Credentials::new(test_url(), "  ", "ops@example.ch", secret);
        assert!(matches!(result, Err(ClientError::Validation(_))));
    }

    #[test]
    fn test_empty_secret_rejected() {
        let result = Secret::new("".to_string());
        assert!(matches!(result, Err(ClientError::Validation(_))));
    }

    #[test]
    fn test_secret_with_line_break_rejected() {
        let result = Secret::new("pass\nword".to_string());
        assert!(matches!(result, Err(ClientError::Validation(_))));
    }

    #[test]
    fn test_secret_debug_does_not_leak() {
        let secret = Secret::new("super-sensitive".to_string()).unwrap();
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-sensitive"));
    }
}
