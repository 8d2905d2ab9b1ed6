//! Client configuration

use crate::classify::ExpirySignature;
use crate::error::{ClientError, Result};
use std::time::Duration;

/// Tuning knobs for the client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    timeout: Duration,
    expiry_signature: ExpirySignature,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Bound on every network exchange
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn expiry_signature(&self) -> &ExpirySignature {
        &self.expiry_signature
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            expiry_signature: ExpirySignature::default(),
        }
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    timeout: Option<Duration>,
    expiry_signature: Option<ExpirySignature>,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the session-invalidity matching rule
    pub fn expiry_signature(mut self, signature: ExpirySignature) -> Self {
        self.expiry_signature = Some(signature);
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(30));
        if timeout.is_zero() {
            return Err(ClientError::Validation(
                "Timeout must be greater than zero".to_string(),
            ));
        }

        Ok(ClientConfig {
            timeout,
            expiry_signature: self.expiry_signature.unwrap_or_default(),
        })
    }
}
