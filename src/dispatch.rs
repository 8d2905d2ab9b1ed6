//! Single-exchange call dispatch

use crate::error::Result;
use crate::protocol::{CALL_PATH, RpcRequest, next_request_id};
use crate::session::Session;
use crate::transport::{Transport, WireResponse};
use std::sync::Arc;

/// Builds and sends one wire envelope per request.
///
/// Performs exactly one network exchange with the session token as the sole
/// authentication artifact, and no internal retries; a pure request/response
/// mapper so retry policy lives in one place.
pub struct CallDispatcher {
    transport: Arc<dyn Transport>,
}

impl CallDispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn dispatch(&self, session: &Session, request: &RpcRequest) -> Result<WireResponse> {
        let request_id = next_request_id();
        let envelope = request.envelope(request_id);

        tracing::debug!(
            model = request.model(),
            method = request.method().wire_name(),
            request_id,
            "dispatching call"
        );

        self.transport
            .exchange(CALL_PATH, &envelope, Some(session.token()))
            .await
    }
}
