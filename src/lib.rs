//! ERP Remote Session & Call Client
//!
//! Session-aware JSON-RPC client for the remote ERP server: login exchange,
//! scoped session storage, call dispatch for the five logical call shapes,
//! classification of server error shapes into a closed taxonomy, and
//! transparent one-shot recovery from session expiry for process-owned
//! sessions.
//!
//! # Example
//!
//! ```rust,ignore
//! use erp_client::{ClientConfig, Credentials, DomainFilter, ErpClient, SearchOptions};
//!
//! #[tokio::main]
//! async fn main() -> erp_client::Result<()> {
//!     let credentials = Credentials::from_env()?;
//!     let client = ErpClient::process_scoped(credentials, ClientConfig::default())?;
//!
//!     let partners = client
//!         .search_read(
//!             "res.partner",
//!             &DomainFilter::eq("email", "a@b.ch"),
//!             &["id", "name"],
//!             &SearchOptions::new().limit(10),
//!         )
//!         .await?;
//!
//!     println!("{} matching partner(s)", partners.len());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod classify;
pub mod client;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod protocol;
pub mod relation;
pub mod retry;
pub mod session;
pub mod transport;

// Re-exports
pub use auth::Authenticator;
pub use classify::{ExpirySignature, Outcome, classify};
pub use client::{ErpClient, SearchOptions};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use credentials::{Credentials, Secret};
pub use dispatch::CallDispatcher;
pub use domain::{DomainElement, DomainFilter};
pub use error::{ClientError, Result, RpcFault};
pub use protocol::{RpcMethod, RpcRequest};
pub use relation::Relation;
pub use retry::{RetryCoordinator, RetryState};
pub use session::{Session, SessionScope, SessionStore};
pub use transport::{HttpTransport, Transport, WireResponse};
