//! Retry coordination for session-expiry recovery
//!
//! The only place in the client where retries happen. Lower components are
//! retry-free by contract, so every call site gets the same policy: one
//! re-authentication, one replay, only for process-owned sessions.

use crate::auth::Authenticator;
use crate::classify::{ExpirySignature, Outcome, classify};
use crate::dispatch::CallDispatcher;
use crate::error::{ClientError, Result};
use crate::protocol::RpcRequest;
use crate::session::{Session, SessionScope, SessionStore};
use serde_json::Value;
use std::sync::Arc;

/// Lifecycle of one governed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// No recovery attempted yet
    Ready,
    /// One re-authentication performed, replay in flight
    Retrying,
    /// Terminal; the outcome surfaces to the caller as-is
    Done,
}

/// Governs one call end to end: dispatch, classification, and the single
/// replay allowed on process-scoped session expiry.
pub struct RetryCoordinator {
    dispatcher: CallDispatcher,
    store: Arc<SessionStore>,
    authenticator: Option<Authenticator>,
    signature: ExpirySignature,
}

impl RetryCoordinator {
    /// Coordinator for a process-owned session: owns re-authentication
    pub fn process(
        dispatcher: CallDispatcher,
        store: Arc<SessionStore>,
        authenticator: Authenticator,
        signature: ExpirySignature,
    ) -> Self {
        Self {
            dispatcher,
            store,
            authenticator: Some(authenticator),
            signature,
        }
    }

    /// Coordinator for a forwarded session: expiry surfaces, never refreshes
    pub fn request(
        dispatcher: CallDispatcher,
        store: Arc<SessionStore>,
        signature: ExpirySignature,
    ) -> Self {
        Self {
            dispatcher,
            store,
            authenticator: None,
            signature,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Target database of the owned credentials, when this coordinator
    /// performs its own authentication
    pub fn database(&self) -> Option<&str> {
        self.authenticator.as_ref().map(Authenticator::database)
    }

    /// Execute one request under the retry policy.
    ///
    /// `Ready → Retrying` happens at most once, and only for a
    /// process-scoped session; every other classification is terminal.
    pub async fn execute(&self, request: &RpcRequest) -> Result<Value> {
        let mut state = RetryState::Ready;
        let mut session = self.initial_session().await?;

        let output = loop {
            let observed = self.store.snapshot().generation;
            let exchange = self.dispatcher.dispatch(&session, request).await;

            match classify(&exchange, &self.signature) {
                Outcome::Success(result) => {
                    state = RetryState::Done;
                    break Ok(result);
                }
                Outcome::BusinessFault(fault) => {
                    state = RetryState::Done;
                    break Err(ClientError::BusinessFault(fault));
                }
                Outcome::TransportFailure(cause) => {
                    state = RetryState::Done;
                    break Err(ClientError::Transport(cause));
                }
                Outcome::SessionExpired(fault) => {
                    match (self.store.scope(), state, &self.authenticator) {
                        (SessionScope::Process, RetryState::Ready, Some(authenticator)) => {
                            tracing::warn!(
                                model = request.model(),
                                fault = %fault,
                                "session expired; re-authenticating and replaying once"
                            );
                            state = RetryState::Retrying;
                            session = self.refresh(authenticator, observed).await?;
                        }
                        (SessionScope::Request, _, _) => {
                            // Forwarded identity: no refresh, no store mutation
                            tracing::debug!(
                                model = request.model(),
                                "forwarded session expired; surfacing to caller"
                            );
                            state = RetryState::Done;
                            break Err(ClientError::SessionExpired);
                        }
                        _ => {
                            // Second expiry on the same request
                            tracing::warn!(
                                model = request.model(),
                                "replay hit session expiry again; surfacing"
                            );
                            state = RetryState::Done;
                            break Err(ClientError::SessionExpired);
                        }
                    }
                }
            }
        };

        tracing::debug!(
            model = request.model(),
            final_state = ?state,
            ok = output.is_ok(),
            "call complete"
        );
        output
    }

    /// Session to use for the first dispatch, authenticating on cold start
    /// for process-owned scopes.
    async fn initial_session(&self) -> Result<Session> {
        let snapshot = self.store.snapshot();
        if let Some(session) = snapshot.session {
            if !snapshot.stale {
                return Ok(session);
            }
        }
        match (&self.authenticator, self.store.scope()) {
            (Some(authenticator), SessionScope::Process) => {
                self.refresh(authenticator, snapshot.generation).await
            }
            // A forwarded scope without a usable session has nothing to
            // dispatch with; the caller must obtain a new token upstream
            _ => Err(ClientError::SessionExpired),
        }
    }

    /// Refresh the stored session under the single-flight guard.
    ///
    /// `observed` is the store generation at the moment expiry was seen; if
    /// the generation moved while waiting for the guard, another task
    /// already performed the login exchange and its session is reused. The
    /// stored session is only marked stale here, under the guard, once the
    /// generation check has confirmed it is the one whose expiry was
    /// observed; invalidating earlier could mark a concurrently refreshed
    /// session stale and defeat the reuse check.
    async fn refresh(&self, authenticator: &Authenticator, observed: u64) -> Result<Session> {
        let _guard = self.store.lock_refresh().await;

        let snapshot = self.store.snapshot();
        if snapshot.generation != observed && !snapshot.stale {
            if let Some(session) = snapshot.session {
                tracing::debug!("session already refreshed by a concurrent call");
                return Ok(session);
            }
        }

        self.store.invalidate();
        let session = authenticator.authenticate().await?;
        self.store.set(session.clone());
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credentials, Secret};
    use crate::protocol::{AUTH_PATH, CALL_PATH, RpcMethod};
    use crate::transport::{MockTransport, Transport, WireResponse};
    use serde_json::json;
    use url::Url;

    fn credentials() -> Credentials {
        Credentials::new(
            Url::parse("https://erp.example.ch").unwrap(),
            "prod_db",
            "svc@example.ch",
            Secret::new("hunter2hunter2".to_string()).unwrap(),
        )
        .unwrap()
    }

    fn expired() -> Result<WireResponse> {
        MockTransport::ok(json!({
            "jsonrpc": "2.0",
            "error": {"code": 100, "message": "Session Expired"}
        }))
    }

    fn success(result: serde_json::Value) -> Result<WireResponse> {
        MockTransport::ok(json!({"jsonrpc": "2.0", "result": result}))
    }

    fn login_ok(token: &str) -> Result<WireResponse> {
        Ok(WireResponse {
            status: 200,
            session_token: Some(token.to_string()),
            body: json!({"jsonrpc": "2.0", "result": {"uid": 7}}),
        })
    }

    fn process_coordinator(
        transport: Arc<MockTransport>,
        seeded: Option<Session>,
    ) -> RetryCoordinator {
        let store = match seeded {
            Some(session) => SessionStore::with_session(SessionScope::Process, session),
            None => SessionStore::new(SessionScope::Process),
        };
        RetryCoordinator::process(
            CallDispatcher::new(transport.clone() as Arc<dyn Transport>),
            Arc::new(store),
            Authenticator::new(transport as Arc<dyn Transport>, credentials()),
            ExpirySignature::default(),
        )
    }

    fn request_coordinator(transport: Arc<MockTransport>, session: Session) -> RetryCoordinator {
        RetryCoordinator::request(
            CallDispatcher::new(transport as Arc<dyn Transport>),
            Arc::new(SessionStore::with_session(SessionScope::Request, session)),
            ExpirySignature::default(),
        )
    }

    fn read_request() -> RpcRequest {
        RpcRequest::new("res.partner", RpcMethod::Read)
            .unwrap()
            .arg(json!([5]))
            .kwarg("fields", json!(["id", "name"]))
    }

    #[tokio::test]
    async fn test_expired_then_recovered() {
        let transport = Arc::new(MockTransport::new(vec![
            expired(),
            login_ok("fresh-token"),
            success(json!([{"id": 5, "name": "Acme SA"}])),
        ]));
        let coordinator =
            process_coordinator(transport.clone(), Some(Session::new("old", 7, "prod_db")));

        // The caller observes only the final success
        let result = coordinator.execute(&read_request()).await.unwrap();
        assert_eq!(result[0]["name"], "Acme SA");

        assert_eq!(transport.calls_to(AUTH_PATH), 1);
        assert_eq!(transport.calls_to(CALL_PATH), 2);

        // The replay carries the refreshed token
        let calls = transport.calls();
        assert_eq!(calls[2].session_token.as_deref(), Some("fresh-token"));
        // And the store was superseded
        assert_eq!(
            coordinator.store().get().unwrap().token(),
            "fresh-token"
        );
    }

    #[tokio::test]
    async fn test_single_replay_invariant() {
        // Every dispatch classifies as expired: exactly one login, one
        // replay, then the error surfaces
        let transport = Arc::new(MockTransport::new(vec![
            expired(),
            login_ok("fresh-token"),
            expired(),
        ]));
        let coordinator =
            process_coordinator(transport.clone(), Some(Session::new("old", 7, "prod_db")));

        let result = coordinator.execute(&read_request()).await;
        assert!(matches!(result, Err(ClientError::SessionExpired)));

        assert_eq!(transport.calls_to(AUTH_PATH), 1);
        assert_eq!(transport.calls_to(CALL_PATH), 2);
    }

    #[tokio::test]
    async fn test_request_scope_never_refreshes() {
        let transport = Arc::new(MockTransport::new(vec![expired()]));
        let coordinator =
            request_coordinator(transport.clone(), Session::new("fwd-tok", 42, "prod_db"));

        let result = coordinator.execute(&read_request()).await;
        assert!(matches!(result, Err(ClientError::SessionExpired)));

        // No login exchange, exactly one dispatch
        assert_eq!(transport.calls_to(AUTH_PATH), 0);
        assert_eq!(transport.calls_to(CALL_PATH), 1);

        // The forwarded session store was never mutated
        let snapshot = coordinator.store().snapshot();
        assert!(!snapshot.stale);
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.session.unwrap().token(), "fwd-tok");
    }

    #[tokio::test]
    async fn test_business_fault_passes_through_without_retry() {
        let transport = Arc::new(MockTransport::new(vec![MockTransport::ok(json!({
            "jsonrpc": "2.0",
            "error": {
                "code": 200,
                "message": "Server Error",
                "data": {"message": "Record does not exist or has been deleted."}
            }
        }))]));
        let coordinator =
            process_coordinator(transport.clone(), Some(Session::new("tok", 7, "prod_db")));

        let result = coordinator.execute(&read_request()).await;
        match result {
            Err(ClientError::BusinessFault(fault)) => {
                assert_eq!(
                    fault.data_message.as_deref(),
                    Some("Record does not exist or has been deleted.")
                );
            }
            other => panic!("expected BusinessFault, got {:?}", other),
        }
        assert_eq!(transport.calls_to(AUTH_PATH), 0);
        assert_eq!(transport.calls_to(CALL_PATH), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_not_retried() {
        let transport = Arc::new(MockTransport::new(vec![Err(ClientError::Transport(
            "connection refused".to_string(),
        ))]));
        let coordinator =
            process_coordinator(transport.clone(), Some(Session::new("tok", 7, "prod_db")));

        let result = coordinator.execute(&read_request()).await;
        assert!(matches!(result, Err(ClientError::Transport(_))));
        assert_eq!(transport.calls_to(AUTH_PATH), 0);
        assert_eq!(transport.calls_to(CALL_PATH), 1);
    }

    #[tokio::test]
    async fn test_cold_start_authenticates_first() {
        let transport = Arc::new(MockTransport::new(vec![
            login_ok("cold-token"),
            success(json!(true)),
        ]));
        let coordinator = process_coordinator(transport.clone(), None);

        coordinator.execute(&read_request()).await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls[0].path, AUTH_PATH);
        assert_eq!(calls[1].path, CALL_PATH);
        assert_eq!(calls[1].session_token.as_deref(), Some("cold-token"));
    }

    #[tokio::test]
    async fn test_cold_start_auth_failure_is_fatal() {
        let transport = Arc::new(MockTransport::new(vec![MockTransport::ok(json!({
            "jsonrpc": "2.0",
            "result": {"uid": false}
        }))]));
        let coordinator = process_coordinator(transport.clone(), None);

        let result = coordinator.execute(&read_request()).await;
        assert!(matches!(result, Err(ClientError::Authentication(_))));
        assert_eq!(transport.calls_to(CALL_PATH), 0);
    }

    /// Transport that withholds the second call-path response until released,
    /// so one task can observe expiry only after another has already
    /// refreshed and replayed.
    struct LateExpiryTransport {
        inner: MockTransport,
        hold: std::sync::Mutex<Option<tokio::sync::oneshot::Receiver<()>>>,
    }

    #[async_trait::async_trait]
    impl Transport for LateExpiryTransport {
        async fn exchange(
            &self,
            path: &str,
            body: &serde_json::Value,
            session_token: Option<&str>,
        ) -> Result<WireResponse> {
            let response = self.inner.exchange(path, body, session_token).await;
            let held = if path == CALL_PATH && self.inner.calls_to(CALL_PATH) == 2 {
                self.hold.lock().unwrap().take()
            } else {
                None
            };
            if let Some(release) = held {
                let _ = release.await;
            }
            response
        }
    }

    #[tokio::test]
    async fn test_late_expiry_observer_reuses_refreshed_session() {
        // Two tasks dispatch with the same stale session. The first one
        // refreshes and replays while the second one's expired response is
        // still in flight; once that response lands, the second task must
        // reuse the refreshed session instead of logging in again.
        let (release_tx, release_rx) = tokio::sync::oneshot::channel();
        let transport = Arc::new(LateExpiryTransport {
            inner: MockTransport::new(vec![
                expired(),
                expired(),
                login_ok("fresh-token"),
                success(json!(true)),
                success(json!(true)),
            ]),
            hold: std::sync::Mutex::new(Some(release_rx)),
        });
        let store = Arc::new(SessionStore::with_session(
            SessionScope::Process,
            Session::new("stale-tok", 7, "prod_db"),
        ));
        let coordinator = Arc::new(RetryCoordinator::process(
            CallDispatcher::new(transport.clone() as Arc<dyn Transport>),
            store,
            Authenticator::new(transport.clone() as Arc<dyn Transport>, credentials()),
            ExpirySignature::default(),
        ));

        // Keep the refresh guard held until both tasks have dispatched, so
        // both observe expiry against the same store generation
        let gate = coordinator.store().lock_refresh().await;

        let mut handles = Vec::new();
        for _ in 0..2 {
            let coordinator = Arc::clone(&coordinator);
            handles.push(tokio::spawn(async move {
                coordinator.execute(&read_request()).await
            }));
        }
        while transport.inner.calls_to(CALL_PATH) < 2 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        drop(gate);

        // Let the first task finish its refresh and replay before the
        // second task's expired response is released
        while transport.inner.calls_to(AUTH_PATH) < 1 || transport.inner.calls_to(CALL_PATH) < 3 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        release_tx.send(()).unwrap();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // The late observer reused the refreshed session: one login, and
        // its replay carried the fresh token
        assert_eq!(transport.inner.calls_to(AUTH_PATH), 1);
        assert_eq!(transport.inner.calls_to(CALL_PATH), 4);
        assert_eq!(coordinator.store().get().unwrap().token(), "fresh-token");
    }

    #[tokio::test]
    async fn test_empty_forwarded_store_surfaces_expiry() {
        let transport = Arc::new(MockTransport::new(vec![]));
        let coordinator = RetryCoordinator::request(
            CallDispatcher::new(transport.clone() as Arc<dyn Transport>),
            Arc::new(SessionStore::new(SessionScope::Request)),
            ExpirySignature::default(),
        );

        let result = coordinator.execute(&read_request()).await;
        assert!(matches!(result, Err(ClientError::SessionExpired)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_expiry_single_login() {
        // Four tasks all observe the same expired session; only one may
        // perform the login exchange, the rest reuse its result
        let transport = Arc::new(MockTransport::new(vec![
            expired(),
            expired(),
            expired(),
            expired(),
            login_ok("shared-token"),
            success(json!(true)),
            success(json!(true)),
            success(json!(true)),
            success(json!(true)),
        ]));
        let coordinator = Arc::new(process_coordinator(
            transport.clone(),
            Some(Session::new("stale-tok", 7, "prod_db")),
        ));

        // Hold the refresh guard so every task observes expiry before any
        // refresh can begin
        let gate = coordinator.store().lock_refresh().await;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let coordinator = Arc::clone(&coordinator);
            handles.push(tokio::spawn(async move {
                coordinator.execute(&read_request()).await
            }));
        }

        // Wait until all four initial dispatches have hit the transport
        while transport.calls_to(CALL_PATH) < 4 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        drop(gate);

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(transport.calls_to(AUTH_PATH), 1);
        assert_eq!(transport.calls_to(CALL_PATH), 8);
        assert_eq!(
            coordinator.store().get().unwrap().token(),
            "shared-token"
        );
    }
}
