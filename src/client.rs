//! High-level ERP client facade

use crate::auth::Authenticator;
use crate::classify::ExpirySignature;
use crate::config::ClientConfig;
use crate::credentials::Credentials;
use crate::dispatch::CallDispatcher;
use crate::domain::DomainFilter;
use crate::error::{ClientError, Result};
use crate::protocol::{RpcMethod, RpcRequest};
use crate::retry::RetryCoordinator;
use crate::session::{Session, SessionScope, SessionStore};
use crate::transport::{HttpTransport, Transport};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use url::Url;

/// Named options for `search_read`
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    limit: Option<u32>,
    offset: Option<u32>,
    order: Option<String>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sort clause, e.g. `"name asc, id desc"`
    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }
}

/// Session-aware client for the remote ERP server.
///
/// The session scope is chosen at construction time and never inferred:
/// [`ErpClient::process_scoped`] owns authentication and transparently
/// recovers from session expiry once per call, while
/// [`ErpClient::request_scoped`] forwards an upstream token and surfaces
/// expiry to the caller untouched.
pub struct ErpClient {
    coordinator: RetryCoordinator,
}

impl ErpClient {
    /// Client owning its session: authenticates on first use and refreshes
    /// on detected expiry under the single-flight guard.
    pub fn process_scoped(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(
            credentials.base_url().clone(),
            config.timeout(),
        )?);
        Ok(Self::process_scoped_with_transport(
            transport,
            credentials,
            config.expiry_signature().clone(),
        ))
    }

    /// Process-scoped client over an injected transport
    pub fn process_scoped_with_transport(
        transport: Arc<dyn Transport>,
        credentials: Credentials,
        signature: ExpirySignature,
    ) -> Self {
        let store = Arc::new(SessionStore::new(SessionScope::Process));
        let coordinator = RetryCoordinator::process(
            CallDispatcher::new(Arc::clone(&transport)),
            store,
            Authenticator::new(transport, credentials),
            signature,
        );
        Self { coordinator }
    }

    /// Client carrying a token forwarded from an upstream caller.
    ///
    /// Expiry surfaces as [`ClientError::SessionExpired`] with no retry;
    /// this client never re-authenticates under someone else's identity.
    pub fn request_scoped(
        base_url: Url,
        database: impl Into<String>,
        token: impl Into<String>,
        user_id: i64,
        config: ClientConfig,
    ) -> Result<Self> {
        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::new(base_url, config.timeout())?);
        Self::request_scoped_with_transport(
            transport,
            database,
            token,
            user_id,
            config.expiry_signature().clone(),
        )
    }

    /// Request-scoped client over an injected transport
    pub fn request_scoped_with_transport(
        transport: Arc<dyn Transport>,
        database: impl Into<String>,
        token: impl Into<String>,
        user_id: i64,
        signature: ExpirySignature,
    ) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ClientError::Validation(
                "Forwarded session token cannot be empty".to_string(),
            ));
        }

        let session = Session::new(token, user_id, database);
        let store = Arc::new(SessionStore::with_session(SessionScope::Request, session));
        let coordinator =
            RetryCoordinator::request(CallDispatcher::new(transport), store, signature);
        Ok(Self { coordinator })
    }

    /// Seed a process-scoped client with a previously obtained session,
    /// skipping the cold-start login as long as it is still accepted.
    ///
    /// A session is only valid for the database it was obtained against, so
    /// seeding one targeting a different database than the credentials is
    /// rejected.
    pub fn with_initial_session(self, session: Session) -> Result<Self> {
        if let Some(database) = self.coordinator.database() {
            if session.database() != database {
                return Err(ClientError::Validation(format!(
                    "Session was obtained against database '{}' but this client targets '{}'",
                    session.database(),
                    database
                )));
            }
        }
        self.coordinator.store().set(session);
        Ok(self)
    }

    pub fn scope(&self) -> SessionScope {
        self.coordinator.store().scope()
    }

    /// Currently held session, if any
    pub fn session(&self) -> Option<Session> {
        self.coordinator.store().get()
    }

    /// Search records matching `domain` and read the given fields.
    ///
    /// The domain filter is validated before any network exchange.
    pub async fn search_read(
        &self,
        model: &str,
        domain: &DomainFilter,
        fields: &[&str],
        options: &SearchOptions,
    ) -> Result<Vec<Map<String, Value>>> {
        let domain_value = domain.to_value()?;

        let mut request = RpcRequest::new(model, RpcMethod::SearchRead)?
            .arg(domain_value)
            .kwarg("fields", json!(fields));
        if let Some(limit) = options.limit {
            request = request.kwarg("limit", limit);
        }
        if let Some(offset) = options.offset {
            request = request.kwarg("offset", offset);
        }
        if let Some(order) = &options.order {
            request = request.kwarg("order", order.as_str());
        }

        let result = self.coordinator.execute(&request).await?;
        records_from(result)
    }

    /// Read the given fields of specific records
    pub async fn read(
        &self,
        model: &str,
        ids: &[i64],
        fields: &[&str],
    ) -> Result<Vec<Map<String, Value>>> {
        let request = RpcRequest::new(model, RpcMethod::Read)?
            .arg(json!(ids))
            .kwarg("fields", json!(fields));

        let result = self.coordinator.execute(&request).await?;
        records_from(result)
    }

    /// Update fields on existing records
    pub async fn write(&self, model: &str, ids: &[i64], values: Map<String, Value>) -> Result<bool> {
        let request = RpcRequest::new(model, RpcMethod::Write)?
            .arg(json!(ids))
            .arg(Value::Object(values));

        let result = self.coordinator.execute(&request).await?;
        result.as_bool().ok_or_else(|| {
            ClientError::Transport(format!("Unexpected write result shape: {}", result))
        })
    }

    /// Create a record, returning its id
    pub async fn create(&self, model: &str, values: Map<String, Value>) -> Result<i64> {
        let request = RpcRequest::new(model, RpcMethod::Create)?.arg(Value::Object(values));

        let result = self.coordinator.execute(&request).await?;
        result.as_i64().ok_or_else(|| {
            ClientError::Transport(format!("Unexpected create result shape: {}", result))
        })
    }

    /// Delete records
    pub async fn unlink(&self, model: &str, ids: &[i64]) -> Result<bool> {
        let request = RpcRequest::new(model, RpcMethod::Unlink)?.arg(json!(ids));

        let result = self.coordinator.execute(&request).await?;
        result.as_bool().ok_or_else(|| {
            ClientError::Transport(format!("Unexpected unlink result shape: {}", result))
        })
    }

    /// Invoke an arbitrary method on a model
    pub async fn call_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value> {
        let request = RpcRequest::new(model, RpcMethod::CallKw(method.to_string()))?
            .args(args)
            .kwargs(kwargs);

        self.coordinator.execute(&request).await
    }
}

fn records_from(result: Value) -> Result<Vec<Map<String, Value>>> {
    let items = match result {
        Value::Array(items) => items,
        other => {
            return Err(ClientError::Transport(format!(
                "Unexpected record list shape: {}",
                other
            )));
        }
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(record) => Ok(record),
            other => Err(ClientError::Transport(format!(
                "Unexpected record shape: {}",
                other
            ))),
        })
        .collect()
}
