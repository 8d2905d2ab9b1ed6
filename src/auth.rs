//! Login exchange against the session-authentication endpoint

use crate::credentials::Credentials;
use crate::error::{ClientError, Result};
use crate::protocol::{AUTH_PATH, auth_envelope};
use crate::session::Session;
use crate::transport::Transport;
use serde_json::Value;
use std::sync::Arc;

/// Performs the login exchange and produces fresh sessions.
///
/// Returns a value only; writing to the Session Store is the caller's
/// responsibility, which keeps this component testable in isolation.
pub struct Authenticator {
    transport: Arc<dyn Transport>,
    credentials: Credentials,
}

impl Authenticator {
    pub fn new(transport: Arc<dyn Transport>, credentials: Credentials) -> Self {
        Self {
            transport,
            credentials,
        }
    }

    pub fn database(&self) -> &str {
        self.credentials.database()
    }

    /// Exchange credentials for a new session.
    ///
    /// The session token comes from the `Set-Cookie` transport header, the
    /// user id from the JSON body. Transport faults propagate as
    /// [`ClientError::Transport`]; a missing user id means the server
    /// rejected the credentials.
    pub async fn authenticate(&self) -> Result<Session> {
        let body = auth_envelope(
            self.credentials.database(),
            self.credentials.login(),
            self.credentials.secret().expose_secret(),
        );

        let response = self.transport.exchange(AUTH_PATH, &body, None).await?;

        if let Some(error) = response.body.get("error") {
            let fault = crate::error::RpcFault::from_error_value(error);
            return Err(ClientError::Authentication(format!(
                "Login rejected for database '{}': {}",
                self.credentials.database(),
                fault
            )));
        }

        // The server reports invalid credentials as `uid: false` inside an
        // otherwise successful result
        let uid = response
            .body
            .pointer("/result/uid")
            .and_then(Value::as_i64)
            .filter(|uid| *uid > 0)
            .ok_or_else(|| {
                ClientError::Authentication(format!(
                    "Server reported no user id for login '{}' on database '{}'",
                    self.credentials.login(),
                    self.credentials.database()
                ))
            })?;

        let token = response.session_token.ok_or_else(|| {
            ClientError::Authentication(
                "Login succeeded but the server returned no session cookie".to_string(),
            )
        })?;

        tracing::info!(
            database = self.credentials.database(),
            user_id = uid,
            "established ERP session"
        );

        Ok(Session::new(token, uid, self.credentials.database()))
    }
}
