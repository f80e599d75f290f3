//! WebHDFS request engine
//!
//! This module turns operation requests into HTTP exchanges:
//! - Operation catalog and option validation
//! - Request target building with percent-encoding
//! - Transport composition (proxy, TLS, timeouts, Kerberos)
//! - Two-phase NameNode/DataNode redirects and HttpFS single-phase uploads
//! - Bounded retry of known transient remote exceptions
//! - Error classification of non-success responses

pub mod catalog;
pub mod builder;
pub mod auth;
pub mod error;
pub mod retry;
pub mod timeout;
pub mod tls;
pub mod payload;
pub mod transport;
pub mod executor;

pub use catalog::{options, OperationCatalog, OperationSpec, Options};
pub use builder::{BuiltRequest, Identity, RequestBuilder, API_PREFIX};
pub use auth::{KerberosNegotiator, SecurityContext};
pub use error::{classify, RemoteException};
pub use retry::{RetryDecision, RetryPolicy};
pub use timeout::TimeoutConfig;
pub use tls::{TlsConfig, TlsVersion, VerifyMode};
pub use payload::{OperationResponse, Payload, PayloadReader};
pub use transport::{
    Connection, Connector, Endpoint, ProxyConfig, ProxyCredentials, ReqwestConnector,
    TransportConfig, WireRequest, WireResponse,
};
pub use executor::{ExecutionState, OperationRequest, RedirectTarget, RequestExecutor};

// Re-export commonly used types
pub use reqwest::{Method, StatusCode};
