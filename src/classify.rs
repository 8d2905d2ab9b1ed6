//! Response classification into the closed error taxonomy
//!
//! Classification is a pure function over one exchange outcome. Ordering is
//! deliberate: transport failures are checked first so an unreachable server
//! is never mistaken for an expired session, and ambiguous faults classify
//! as business faults rather than expiry so permission errors are never
//! masked.

use crate::error::{Result, RpcFault};
use crate::transport::WireResponse;
use serde_json::Value;

/// Classified outcome of one call exchange
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The envelope carried a `result`
    Success(Value),
    /// The fault matched the configured session-invalidity signature
    SessionExpired(RpcFault),
    /// Any other fault, carried verbatim
    BusinessFault(RpcFault),
    /// The exchange itself failed, or the envelope was malformed
    TransportFailure(String),
}

/// Configurable signature of a session-invalidity fault.
///
/// The exact code/message the server uses for "please re-authenticate" is
/// not uniformly documented, so the matching rule is configuration rather
/// than a constant. Matching fails closed: a fault matching neither list is
/// a business fault.
#[derive(Debug, Clone)]
pub struct ExpirySignature {
    codes: Vec<i64>,
    markers: Vec<String>,
}

impl ExpirySignature {
    pub fn new(codes: Vec<i64>, markers: Vec<String>) -> Self {
        Self {
            codes,
            markers: markers.into_iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    pub fn matches(&self, fault: &RpcFault) -> bool {
        if self.codes.contains(&fault.code) {
            return true;
        }
        let texts = [Some(fault.message.as_str()), fault.data_message.as_deref()];
        texts.into_iter().flatten().any(|text| {
            let text = text.to_lowercase();
            self.markers.iter().any(|marker| text.contains(marker))
        })
    }
}

impl Default for ExpirySignature {
    fn default() -> Self {
        // Code 100 is the server's session-invalidity code; the markers
        // cover the message variants observed across server versions
        Self::new(
            vec![100],
            vec![
                "session expired".to_string(),
                "session invalid".to_string(),
                "sessionexpiredexception".to_string(),
            ],
        )
    }
}

/// Map a raw exchange outcome into the closed taxonomy.
///
/// Pure function: classifying the same input twice yields the same outcome.
pub fn classify(exchange: &Result<WireResponse>, signature: &ExpirySignature) -> Outcome {
    let response = match exchange {
        Err(err) => return Outcome::TransportFailure(err.to_string()),
        Ok(response) => response,
    };

    if let Some(error) = response.body.get("error") {
        let fault = RpcFault::from_error_value(error);
        if signature.matches(&fault) {
            return Outcome::SessionExpired(fault);
        }
        return Outcome::BusinessFault(fault);
    }

    if let Some(result) = response.body.get("result") {
        return Outcome::Success(result.clone());
    }

    // Neither field: the envelope contract was violated
    Outcome::TransportFailure(format!(
        "Response carried neither result nor error (HTTP {})",
        response.status
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use serde_json::json;

    fn response(body: Value) -> Result<WireResponse> {
        Ok(WireResponse {
            status: 200,
            session_token: None,
            body,
        })
    }

    #[test]
    fn test_result_classifies_as_success() {
        let exchange = response(json!({"jsonrpc": "2.0", "id": 1, "result": [{"id": 5}]}));
        let outcome = classify(&exchange, &ExpirySignature::default());
        assert_eq!(outcome, Outcome::Success(json!([{"id": 5}])));
    }

    #[test]
    fn test_expiry_code_classifies_as_session_expired() {
        let exchange = response(json!({
            "jsonrpc": "2.0",
            "error": {"code": 100, "message": "Session Expired"}
        }));
        let outcome = classify(&exchange, &ExpirySignature::default());
        assert!(matches!(outcome, Outcome::SessionExpired(_)));
    }

    #[test]
    fn test_expiry_marker_in_data_message() {
        let exchange = response(json!({
            "jsonrpc": "2.0",
            "error": {
                "code": 200,
                "message": "Server Error",
                "data": {"message": "SessionExpiredException: please log in again"}
            }
        }));
        let outcome = classify(&exchange, &ExpirySignature::default());
        assert!(matches!(outcome, Outcome::SessionExpired(_)));
    }

    #[test]
    fn test_other_fault_classifies_as_business_fault() {
        let exchange = response(json!({
            "jsonrpc": "2.0",
            "error": {
                "code": 200,
                "message": "Validation Error",
                "data": {"message": "A delivery date is required."}
            }
        }));
        let outcome = classify(&exchange, &ExpirySignature::default());
        match outcome {
            Outcome::BusinessFault(fault) => {
                assert_eq!(
                    fault.data_message.as_deref(),
                    Some("A delivery date is required.")
                );
            }
            other => panic!("expected BusinessFault, got {:?}", other),
        }
    }

    #[test]
    fn test_ambiguous_permission_fault_fails_closed() {
        // Looks auth-ish but matches no configured signature: must not be
        // treated as expiry, or a real permission denial would be masked
        let exchange = response(json!({
            "jsonrpc": "2.0",
            "error": {"code": 403, "message": "Access Denied to res.partner"}
        }));
        let outcome = classify(&exchange, &ExpirySignature::default());
        assert!(matches!(outcome, Outcome::BusinessFault(_)));
    }

    #[test]
    fn test_transport_error_wins_over_everything() {
        let exchange: Result<WireResponse> =
            Err(ClientError::Transport("request timed out".to_string()));
        let outcome = classify(&exchange, &ExpirySignature::default());
        match outcome {
            Outcome::TransportFailure(msg) => assert!(msg.contains("timed out")),
            other => panic!("expected TransportFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_envelope_without_result_or_error() {
        let exchange = Ok(WireResponse {
            status: 502,
            session_token: None,
            body: json!({"detail": "bad gateway"}),
        });
        let outcome = classify(&exchange, &ExpirySignature::default());
        match outcome {
            Outcome::TransportFailure(msg) => assert!(msg.contains("502")),
            other => panic!("expected TransportFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_classification_is_idempotent() {
        let exchange = response(json!({
            "jsonrpc": "2.0",
            "error": {"code": 100, "message": "Session Expired"}
        }));
        let signature = ExpirySignature::default();
        assert_eq!(
            classify(&exchange, &signature),
            classify(&exchange, &signature)
        );
    }

    #[test]
    fn test_custom_signature() {
        let signature = ExpirySignature::new(vec![], vec!["please re-authenticate".to_string()]);
        let exchange = response(json!({
            "jsonrpc": "2.0",
            "error": {"code": 77, "message": "Please re-authenticate"}
        }));
        assert!(matches!(
            classify(&exchange, &signature),
            Outcome::SessionExpired(_)
        ));

        // Default code 100 no longer matches under the custom signature
        let exchange = response(json!({
            "jsonrpc": "2.0",
            "error": {"code": 100, "message": "weird"}
        }));
        assert!(matches!(
            classify(&exchange, &signature),
            Outcome::BusinessFault(_)
        ));
    }
}
