//! WebHDFS Core - Request engine for the WebHDFS/HttpFS REST protocol
//!
//! This crate turns filesystem operations into HTTP exchanges with a Hadoop
//! NameNode (or HttpFS gateway) and the DataNodes it redirects to.
//!
//! # Main Components
//!
//! - **Operation Catalog**: Per-operation HTTP method, allowed options and redirect behavior
//! - **Request Executor**: Two-phase redirects, bounded retry, Kerberos challenges, cancellation
//! - **Transport**: Proxy, TLS, timeouts and SPNEGO composed into a `reqwest` client
//! - **Error Handling**: Status-code classification into typed errors using `thiserror`
//! - **Client**: One method per filesystem operation, configurable from TOML or environment
//!
//! # Example
//!
//! ```no_run
//! use webhdfs_core::{options, Result, WebHdfsClient};
//!
//! async fn example() -> Result<()> {
//!     let client = WebHdfsClient::builder("namenode", 50070)
//!         .username("hdfs")
//!         .build()?;
//!
//!     client.create("/tmp/hello.txt", "hello", options([("overwrite", "true")])).await?;
//!     let data = client.read("/tmp/hello.txt", Default::default()).await?;
//!     assert_eq!(&data[..], b"hello");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod http;
pub mod client;
pub mod config;

// Re-export main types for convenience
pub use error::{Error, ErrorKind, Result};
pub use client::{WebHdfsClient, WebHdfsClientBuilder};
pub use config::ClientConfig;
pub use http::{
    options, Endpoint, Identity, OperationCatalog, OperationRequest, OperationResponse, Options,
    Payload, ProxyConfig, RequestExecutor, RetryPolicy, SecurityContext, TimeoutConfig, TlsConfig,
    TransportConfig,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
