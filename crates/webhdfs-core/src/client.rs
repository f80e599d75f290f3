//! High-level WebHDFS client
//!
//! One method per filesystem operation. Each method injects its dispatch
//! parameters, runs the operation through the [`RequestExecutor`] and
//! extracts the result from the response.

use std::sync::Arc;
use bytes::Bytes;
use serde_json::Value;
use tracing::debug;
use crate::http::auth::{KerberosNegotiator, SecurityContext};
use crate::http::builder::{Identity, RequestBuilder};
use crate::http::catalog::{OperationCatalog, Options};
use crate::http::executor::{OperationRequest, RequestExecutor};
use crate::http::payload::{OperationResponse, Payload};
use crate::http::retry::RetryPolicy;
use crate::http::timeout::TimeoutConfig;
use crate::http::tls::TlsConfig;
use crate::http::transport::{Connector, Endpoint, ProxyConfig, TransportConfig};
use crate::{Error, Result};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 50070;

/// Builder for [`WebHdfsClient`]
pub struct WebHdfsClientBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    doas: Option<String>,
    proxy: Option<ProxyConfig>,
    tls: Option<TlsConfig>,
    timeouts: TimeoutConfig,
    kerberos: Option<Box<dyn SecurityContext>>,
    retry: RetryPolicy,
    httpfs_mode: bool,
    headers: Vec<(String, String)>,
    connector: Option<Arc<dyn Connector>>,
}

impl Default for WebHdfsClientBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl WebHdfsClientBuilder {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            doas: None,
            proxy: None,
            tls: None,
            timeouts: TimeoutConfig::default(),
            kerberos: None,
            retry: RetryPolicy::default(),
            httpfs_mode: false,
            headers: Vec::new(),
            connector: None,
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn doas(mut self, doas: impl Into<String>) -> Self {
        self.doas = Some(doas.into());
        self
    }

    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Talk HTTPS to every host
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Authenticate with SPNEGO using `context` for service `HTTP@<host>`
    pub fn kerberos(mut self, context: Box<dyn SecurityContext>) -> Self {
        self.kerberos = Some(context);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn httpfs_mode(mut self, httpfs_mode: bool) -> Self {
        self.httpfs_mode = httpfs_mode;
        self
    }

    /// Extra header sent with every request
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the network layer
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn build(self) -> Result<WebHdfsClient> {
        if self.host.trim().is_empty() {
            return Err(Error::configuration("Host must not be empty"));
        }

        let mut transport = TransportConfig::new().with_timeouts(self.timeouts);
        if let Some(proxy) = self.proxy {
            transport = transport.with_proxy(proxy);
        }
        if let Some(tls) = self.tls {
            transport = transport.with_tls(tls);
        }
        if let Some(context) = self.kerberos {
            let principal = KerberosNegotiator::service_principal_for(&self.host);
            transport = transport.with_kerberos(Arc::new(KerberosNegotiator::new(principal, context)?));
        }

        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(transport.build_connector()?),
        };

        let namenode = Endpoint::new(transport.scheme(), self.host, self.port);
        let identity = Identity::new(self.username, self.doas);

        let mut executor = RequestExecutor::new(namenode, identity, transport, connector)
            .with_retry(self.retry)
            .with_httpfs_mode(self.httpfs_mode);
        for (name, value) in &self.headers {
            executor = executor.with_header(name, value)?;
        }

        debug!(?executor, "built WebHDFS client");
        Ok(WebHdfsClient { executor })
    }
}

/// WebHDFS/HttpFS filesystem client
#[derive(Debug)]
pub struct WebHdfsClient {
    executor: RequestExecutor,
}

impl WebHdfsClient {
    pub fn builder(host: impl Into<String>, port: u16) -> WebHdfsClientBuilder {
        WebHdfsClientBuilder::new(host, port)
    }

    /// The underlying executor, for raw operations and cancellation
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    async fn run(&self, request: OperationRequest, payload: Option<Payload>) -> Result<OperationResponse> {
        self.executor.execute(request, payload).await
    }

    /// Upload `payload` as a new file
    pub async fn create(&self, path: &str, payload: impl Into<Payload>, options: Options) -> Result<bool> {
        let request = self.upload_request("CREATE", path, options);
        succeeded(&self.run(request, Some(payload.into())).await?, "CREATE")
    }

    /// Append `payload` to an existing file
    pub async fn append(&self, path: &str, payload: impl Into<Payload>, options: Options) -> Result<bool> {
        let request = self.upload_request("APPEND", path, options);
        succeeded(&self.run(request, Some(payload.into())).await?, "APPEND")
    }

    /// Read a file's contents
    pub async fn read(&self, path: &str, options: Options) -> Result<Bytes> {
        let request = OperationRequest::new("OPEN", path).with_options(options);
        Ok(self.run(request, None).await?.body)
    }

    pub async fn mkdir(&self, path: &str, options: Options) -> Result<bool> {
        let request = OperationRequest::new("MKDIRS", path).with_options(options);
        expect_json(self.run(request, None).await?)?.boolean()
    }

    /// Rename `path` to `destination`; a relative destination is made absolute
    pub async fn rename(&self, path: &str, destination: &str, options: Options) -> Result<bool> {
        let request = OperationRequest::new("RENAME", path)
            .with_options(options)
            .with_param("destination", RequestBuilder::normalize_destination(destination));
        expect_json(self.run(request, None).await?)?.boolean()
    }

    pub async fn delete(&self, path: &str, options: Options) -> Result<bool> {
        let request = OperationRequest::new("DELETE", path).with_options(options);
        expect_json(self.run(request, None).await?)?.boolean()
    }

    pub async fn stat(&self, path: &str, options: Options) -> Result<Value> {
        let request = OperationRequest::new("GETFILESTATUS", path).with_options(options);
        attribute(self.run(request, None).await?, &["FileStatus"])
    }

    /// Entries of a directory (or the file itself)
    pub async fn list(&self, path: &str, options: Options) -> Result<Value> {
        let request = OperationRequest::new("LISTSTATUS", path).with_options(options);
        attribute(self.run(request, None).await?, &["FileStatuses", "FileStatus"])
    }

    pub async fn content_summary(&self, path: &str, options: Options) -> Result<Value> {
        let request = OperationRequest::new("GETCONTENTSUMMARY", path).with_options(options);
        attribute(self.run(request, None).await?, &["ContentSummary"])
    }

    pub async fn checksum(&self, path: &str, options: Options) -> Result<Value> {
        let request = OperationRequest::new("GETFILECHECKSUM", path).with_options(options);
        attribute(self.run(request, None).await?, &["FileChecksum"])
    }

    /// Home directory of the effective user
    pub async fn homedir(&self, options: Options) -> Result<Value> {
        let request = OperationRequest::new("GETHOMEDIRECTORY", "/").with_options(options);
        attribute(self.run(request, None).await?, &["Path"])
    }

    /// Set permission bits, e.g. `"755"`
    pub async fn chmod(&self, path: &str, mode: &str, options: Options) -> Result<bool> {
        let request = OperationRequest::new("SETPERMISSION", path)
            .with_options(options)
            .with_param("permission", mode);
        succeeded(&self.run(request, None).await?, "SETPERMISSION")
    }

    /// Set owner and/or group; at least one of them must be given
    pub async fn chown(&self, path: &str, options: Options) -> Result<bool> {
        let request = OperationRequest::new("SETOWNER", path).with_options(options);
        succeeded(&self.run(request, None).await?, "SETOWNER")
    }

    pub async fn set_replication(&self, path: &str, replication: u16, options: Options) -> Result<bool> {
        let request = OperationRequest::new("SETREPLICATION", path)
            .with_options(options)
            .with_param("replication", replication.to_string());
        expect_json(self.run(request, None).await?)?.boolean()
    }

    /// Set modification and/or access time (milliseconds since the epoch)
    pub async fn touch(&self, path: &str, options: Options) -> Result<bool> {
        let request = OperationRequest::new("SETTIMES", path).with_options(options);
        succeeded(&self.run(request, None).await?, "SETTIMES")
    }

    fn upload_request(&self, operation: &str, path: &str, options: Options) -> OperationRequest {
        let request = OperationRequest::new(operation, path).with_options(options);
        if self.executor.is_httpfs_mode() {
            request.with_param("data", "true")
        } else {
            request
        }
    }
}

/// Whether the status is the one `operation` answers with on success
fn succeeded(response: &OperationResponse, operation: &str) -> Result<bool> {
    Ok(response.status == OperationCatalog::global().get(operation)?.success_status)
}

/// 200 with a JSON body, as the boolean and attribute operations return
fn expect_json(response: OperationResponse) -> Result<OperationResponse> {
    if response.status != 200 {
        return Err(Error::protocol(
            format!("expected status 200, got {}", response.status),
            Some(response.status),
        ));
    }
    if !response.is_json() {
        return Err(Error::protocol(
            format!(
                "expected an application/json response, got {}",
                response.content_type().unwrap_or("no content type")
            ),
            Some(response.status),
        ));
    }
    Ok(response)
}

/// Nested JSON attribute at `keys`
fn attribute(response: OperationResponse, keys: &[&str]) -> Result<Value> {
    let response = expect_json(response)?;
    let mut value = response.json_attribute(keys[0])?;
    for key in &keys[1..] {
        value = value.get_mut(*key).map(Value::take).ok_or_else(|| {
            Error::protocol(
                format!("response has no \"{}\" attribute", keys.join(".")),
                Some(response.status),
            )
        })?;
    }
    Ok(value)
}
