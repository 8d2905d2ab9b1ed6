//! Transport seam for the ERP wire protocol
//!
//! One trait, one production implementation over `reqwest`, and a mock for
//! tests. A transport performs exactly one exchange per call; retrying is
//! the Retry Coordinator's exclusive responsibility.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use std::time::Duration;
use url::Url;

/// Cookie name carrying the session token
pub const SESSION_COOKIE: &str = "session_id";

/// Raw outcome of one wire exchange.
///
/// The body is parsed JSON only; interpreting `result` versus `error` is the
/// classifier's job.
#[derive(Debug, Clone)]
pub struct WireResponse {
    /// HTTP status code
    pub status: u16,
    /// Session token from a `Set-Cookie: session_id=...` header, if any
    pub session_token: Option<String>,
    /// Parsed JSON body
    pub body: serde_json::Value,
}

/// Abstraction over the HTTP exchange with the remote server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one POST exchange against `path`, attaching the session token
    /// as the `session_id` cookie when present.
    async fn exchange(
        &self,
        path: &str,
        body: &serde_json::Value,
        session_token: Option<&str>,
    ) -> Result<WireResponse>;
}

/// Production transport over `reqwest` with a bounded per-request timeout
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    fn extract_session_cookie(headers: &reqwest::header::HeaderMap) -> Option<String> {
        headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|cookie| {
                let (name, rest) = cookie.split_once('=')?;
                if name.trim() != SESSION_COOKIE {
                    return None;
                }
                let token = rest.split(';').next()?.trim();
                (!token.is_empty()).then(|| token.to_string())
            })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn exchange(
        &self,
        path: &str,
        body: &serde_json::Value,
        session_token: Option<&str>,
    ) -> Result<WireResponse> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ClientError::Transport(format!("Invalid endpoint path: {}", e)))?;

        let mut request = self.client.post(url).json(body);
        if let Some(token) = session_token {
            request = request.header(COOKIE, format!("{}={}", SESSION_COOKIE, token));
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let session_token = Self::extract_session_cookie(response.headers());
        let body = response.json::<serde_json::Value>().await.map_err(|e| {
            ClientError::Transport(format!("Malformed response body (HTTP {}): {}", status, e))
        })?;

        Ok(WireResponse {
            status,
            session_token,
            body,
        })
    }
}

/// Mock transport for testing
#[cfg(test)]
pub(crate) struct MockTransport {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<WireResponse>>>,
    calls: std::sync::Mutex<Vec<RecordedCall>>,
}

#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub path: String,
    pub body: serde_json::Value,
    pub session_token: Option<String>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new(responses: Vec<Result<WireResponse>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Shorthand for a 200 response with the given JSON body
    pub fn ok(body: serde_json::Value) -> Result<WireResponse> {
        Ok(WireResponse {
            status: 200,
            session_token: None,
            body,
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("mock call log poisoned").clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls().iter().filter(|call| call.path == path).count()
    }
}

#[cfg(test)]
#[async_trait]
impl Transport for MockTransport {
    async fn exchange(
        &self,
        path: &str,
        body: &serde_json::Value,
        session_token: Option<&str>,
    ) -> Result<WireResponse> {
        self.calls
            .lock()
            .expect("mock call log poisoned")
            .push(RecordedCall {
                path: path.to_string(),
                body: body.clone(),
                session_token: session_token.map(str::to_string),
            });

        self.responses
            .lock()
            .expect("mock response queue poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Transport("No more mock responses".to_string())))
    }
}
