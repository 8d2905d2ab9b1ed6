//! JSON-RPC envelope types for the ERP wire protocol
//!
//! The remote server speaks a JSON-RPC 2.0 dialect where every exchange is a
//! POST with `method: "call"` and the actual operation lives in `params`.
//! These shapes reproduce the server's contract exactly; they are not
//! designed here.

use crate::error::{ClientError, Result};
use serde_json::{Map, Value, json};
use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed path of the session-authentication endpoint
pub const AUTH_PATH: &str = "/web/session/authenticate";
/// Fixed path of the generic call endpoint
pub const CALL_PATH: &str = "/web/dataset/call_kw";

static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Next correlation id for an outgoing envelope.
///
/// Echoed back by the server; carries no session semantics, only uniqueness
/// within the process.
pub(crate) fn next_request_id() -> u64 {
    REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// The five logical call shapes, all instances of the same envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcMethod {
    Read,
    SearchRead,
    Write,
    Create,
    Unlink,
    /// Generic method invocation by name
    CallKw(String),
}

impl RpcMethod {
    /// Method name as sent on the wire
    pub fn wire_name(&self) -> &str {
        match self {
            Self::Read => "read",
            Self::SearchRead => "search_read",
            Self::Write => "write",
            Self::Create => "create",
            Self::Unlink => "unlink",
            Self::CallKw(name) => name,
        }
    }
}

/// One remote procedure call against a target model.
///
/// Immutable once built; the Retry Coordinator replays the same request
/// verbatim after a session refresh.
#[derive(Debug, Clone)]
pub struct RpcRequest {
    model: String,
    method: RpcMethod,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
}

impl RpcRequest {
    /// Create a request with validation
    pub fn new(model: impl Into<String>, method: RpcMethod) -> Result<Self> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(ClientError::Validation(
                "Model name cannot be empty".to_string(),
            ));
        }
        if let RpcMethod::CallKw(name) = &method {
            if name.trim().is_empty() {
                return Err(ClientError::Validation(
                    "Method name cannot be empty".to_string(),
                ));
            }
        }

        Ok(Self {
            model,
            method,
            args: Vec::new(),
            kwargs: Map::new(),
        })
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a named option
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Replace all positional arguments
    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Replace all named options
    pub fn kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn method(&self) -> &RpcMethod {
        &self.method
    }

    /// Build the wire envelope for this request
    pub fn envelope(&self, request_id: u64) -> Value {
        json!({
            "jsonrpc": "2.0",
            "method": "call",
            "id": request_id,
            "params": {
                "model": self.model,
                "method": self.method.wire_name(),
                "args": self.args,
                "kwargs": self.kwargs,
            }
        })
    }
}

/// Build the login envelope for the session-authentication endpoint
pub fn auth_envelope(database: &str, login: &str, password: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "call",
        "params": {
            "db": database,
            "login": login,
            "password": password,
        }
    })
}
