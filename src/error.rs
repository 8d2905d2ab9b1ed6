//! Error types for the ERP client

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// The server's own error envelope, captured verbatim before classification.
///
/// Carries the JSON-RPC `error` payload fields: the numeric code, the outer
/// message, the nested `data.message` (usually the human-readable text), and
/// the optional `data.debug` server-side trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcFault {
    /// Numeric fault code from the `error.code` field
    pub code: i64,
    /// Outer fault message
    pub message: String,
    /// Nested `data.message`, when present
    #[serde(default)]
    pub data_message: Option<String>,
    /// Server-side traceback from `data.debug`, when present
    #[serde(default)]
    pub debug: Option<String>,
}

impl RpcFault {
    /// Extract a fault from a raw `error` payload.
    ///
    /// Unfamiliar shapes never fail: anything that does not carry the expected
    /// fields is preserved as the raw payload text so diagnostics survive.
    pub fn from_error_value(error: &Value) -> Self {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        let data_message = error
            .pointer("/data/message")
            .and_then(Value::as_str)
            .map(str::to_string);
        let debug = error
            .pointer("/data/debug")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            code,
            message,
            data_message,
            debug,
        }
    }
}

impl std::fmt::Display for RpcFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)?;
        if let Some(detail) = &self.data_message {
            if detail != &self.message {
                write!(f, ": {}", detail)?;
            }
        }
        Ok(())
    }
}

/// Errors that can occur during ERP client operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// Login exchange rejected the credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Session invalid or expired, and no governed replay was applicable
    #[error("Session expired")]
    SessionExpired,

    /// The server rejected the operation for domain reasons
    #[error("Server fault: {0}")]
    BusinessFault(RpcFault),

    /// Network error, timeout, or malformed response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Caller-side misuse detected before any network exchange
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {}", err))
        } else {
            Self::Transport(err.to_string())
        }
    }
}
