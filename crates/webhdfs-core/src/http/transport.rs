//! Connection building
//!
//! [`TransportConfig`] composes proxy, TLS, timeouts and Kerberos into a
//! [`Connector`]. Each phase of an operation opens its own [`Connection`],
//! sends exactly one request through it and drops it.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, LOCATION, WWW_AUTHENTICATE};
use reqwest::{Body, Method};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio_util::io::ReaderStream;
use crate::http::auth::KerberosNegotiator;
use crate::http::payload::{Payload, PayloadReader};
use crate::http::timeout::TimeoutConfig;
use crate::http::tls::TlsConfig;
use crate::{Error, Result};

/// Host a single phase talks to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
        }
    }

    pub fn http(host: impl Into<String>, port: u16) -> Self {
        Self::new("http", host, port)
    }

    pub fn https(host: impl Into<String>, port: u16) -> Self {
        Self::new("https", host, port)
    }

    /// Absolute URL for a `path?query` target on this endpoint
    pub fn url(&self, target: &str) -> String {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        format!("{}://{}:{}{}", self.scheme, host, self.port, target)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One request as put on the wire
#[derive(Debug)]
pub struct WireRequest {
    pub method: Method,
    /// `path?query`
    pub target: String,
    pub headers: HeaderMap,
    pub body: Option<Payload>,
}

/// One buffered response
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl WireResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Non-empty `Location` header
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Last `WWW-Authenticate` header, if any
    pub fn www_authenticate(&self) -> Option<&str> {
        self.headers
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .last()
            .and_then(|v| v.to_str().ok())
    }
}

/// A single-use connection to one endpoint
#[async_trait]
pub trait Connection: Send {
    /// Send one request; the connection is closed when this returns
    async fn send(self: Box<Self>, request: WireRequest) -> Result<WireResponse>;
}

/// Opens connections to endpoints
pub trait Connector: Send + Sync {
    fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>>;
}

/// Proxy basic credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyCredentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for ProxyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// HTTP proxy every connection is tunneled through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub address: String,
    pub port: u16,
    pub credentials: Option<ProxyCredentials>,
}

impl ProxyConfig {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(ProxyCredentials {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    pub fn has_authentication(&self) -> bool {
        self.credentials.is_some()
    }

    fn to_reqwest(&self) -> Result<reqwest::Proxy> {
        let url = format!("http://{}:{}", self.address, self.port);
        let proxy = reqwest::Proxy::all(&url).map_err(|e| Error::Configuration {
            message: format!("Invalid proxy {}: {}", url, e),
            source: Some(e.into()),
        })?;
        Ok(match &self.credentials {
            Some(creds) => proxy.basic_auth(&creds.user, &creds.password),
            None => proxy,
        })
    }
}

/// Proxy, TLS, timeouts and Kerberos, each optional and independent
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    pub proxy: Option<ProxyConfig>,
    pub tls: Option<TlsConfig>,
    pub timeouts: TimeoutConfig,
    pub kerberos: Option<Arc<KerberosNegotiator>>,
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_kerberos(mut self, negotiator: Arc<KerberosNegotiator>) -> Self {
        self.kerberos = Some(negotiator);
        self
    }

    /// Scheme for the primary host
    pub fn scheme(&self) -> &'static str {
        if self.tls.is_some() {
            "https"
        } else {
            "http"
        }
    }

    /// Build the underlying client: proxy, then TLS, then timeouts.
    ///
    /// Redirects are never followed automatically and idle connections are
    /// not kept, so every phase gets a fresh connection.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(0);

        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(proxy.to_reqwest()?);
        }

        if let Some(tls) = &self.tls {
            builder = tls.apply_to(builder)?;
        }

        self.timeouts
            .validate()
            .map_err(Error::configuration)?;
        builder = self.timeouts.apply_to(builder);

        builder.build().map_err(|e| Error::Configuration {
            message: format!("Failed to create HTTP client: {}", e),
            source: Some(e.into()),
        })
    }

    pub fn build_connector(&self) -> Result<ReqwestConnector> {
        Ok(ReqwestConnector::new(self.build_client()?))
    }

    /// Add the `Authorization: Negotiate` header when Kerberos is configured
    pub fn apply_auth_headers(&self, headers: &mut HeaderMap) -> Result<()> {
        if let Some(kerberos) = &self.kerberos {
            let value = HeaderValue::from_str(&kerberos.authorization_header()?)
                .map_err(|e| Error::kerberos(format!("Token is not a valid header value: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(())
    }

    /// A 307 with `WWW-Authenticate` is a Negotiate challenge when Kerberos
    /// is configured
    pub fn is_kerberos_challenge(&self, response: &WireResponse) -> bool {
        self.kerberos.is_some() && response.status == 307 && response.www_authenticate().is_some()
    }

    pub fn handle_challenge(&self, response: &WireResponse) -> Result<()> {
        match &self.kerberos {
            Some(kerberos) => kerberos.handle_challenge(response.www_authenticate()),
            None => Ok(()),
        }
    }
}

/// [`Connector`] backed by a reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestConnector {
    client: reqwest::Client,
}

impl ReqwestConnector {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Connector for ReqwestConnector {
    fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>> {
        Ok(Box::new(ReqwestConnection {
            client: self.client.clone(),
            endpoint: endpoint.clone(),
        }))
    }
}

struct ReqwestConnection {
    client: reqwest::Client,
    endpoint: Endpoint,
}

struct Tally {
    reader: Mutex<PayloadReader>,
    consumed: AtomicU64,
    exhausted: AtomicBool,
}

/// Streamed payload that records how many bytes the transfer pulled and
/// whether the underlying reader ran dry.
///
/// The HTTP layer stops reading once `Content-Length` bytes are sent, so the
/// declared length has to be checked against the reader after the exchange.
#[derive(Clone)]
struct CountingReader {
    tally: Arc<Tally>,
}

impl CountingReader {
    fn new(reader: PayloadReader) -> Self {
        Self {
            tally: Arc::new(Tally {
                reader: Mutex::new(reader),
                consumed: AtomicU64::new(0),
                exhausted: AtomicBool::new(false),
            }),
        }
    }

    fn consumed(&self) -> u64 {
        self.tally.consumed.load(Ordering::Acquire)
    }

    fn exhausted(&self) -> bool {
        self.tally.exhausted.load(Ordering::Acquire)
    }

    /// Fails when the reader held fewer or more bytes than `length`
    async fn check_length(&self, length: u64) -> Result<()> {
        let sent = self.consumed();
        if sent < length {
            return Err(Error::Io {
                message: format!("payload reader ended after {} of {} declared bytes", sent, length),
                source: io::Error::new(io::ErrorKind::UnexpectedEof, "payload shorter than declared"),
            });
        }

        let mut extra = [0u8; 1];
        if self.clone().read(&mut extra).await? > 0 {
            return Err(Error::Io {
                message: format!("payload reader holds more than the declared {} bytes", length),
                source: io::Error::new(io::ErrorKind::InvalidData, "payload longer than declared"),
            });
        }
        Ok(())
    }
}

impl AsyncRead for CountingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let mut reader = match self.tally.reader.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let poll = Pin::new(&mut **reader).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = poll {
            let read = (buf.filled().len() - before) as u64;
            if read == 0 && buf.remaining() > 0 {
                self.tally.exhausted.store(true, Ordering::Release);
            }
            self.tally.consumed.fetch_add(read, Ordering::AcqRel);
        }
        poll
    }
}

impl ReqwestConnection {
    fn transport_error(&self, action: &str, error: reqwest::Error) -> Error {
        Error::Transport {
            host: self.endpoint.host.clone(),
            port: self.endpoint.port,
            message: format!("{} failed: {}", action, error),
            source: Some(Box::new(error)),
        }
    }
}

#[async_trait]
impl Connection for ReqwestConnection {
    async fn send(self: Box<Self>, request: WireRequest) -> Result<WireResponse> {
        let url = self.endpoint.url(&request.target);
        let mut headers = request.headers;

        // WebHDFS rejects chunked uploads
        if let Some(body) = &request.body {
            if !headers.contains_key(CONTENT_LENGTH) {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
            }
        }

        let mut builder = self.client.request(request.method, &url).headers(headers);
        let mut streamed = None;

        match request.body {
            Some(Payload::InMemory(bytes)) => {
                builder = builder.body(bytes);
            }
            Some(Payload::Streamed { reader, length }) => {
                let counting = CountingReader::new(reader);
                let bounded = counting.clone().take(length);
                builder = builder.body(Body::wrap_stream(ReaderStream::new(bounded)));
                streamed = Some((counting, length));
            }
            None => {}
        }

        let response = builder.send().await;

        // A reader that ran dry aborts the transfer; report that rather than
        // the transport symptom. A server answering before the whole body was
        // sent leaves both conditions false.
        if let Some((counting, length)) = &streamed {
            if counting.exhausted() || counting.consumed() == *length {
                counting.check_length(*length).await?;
            }
        }

        let response = response.map_err(|e| self.transport_error("request", e))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error("reading response body", e))?;

        Ok(WireResponse { status, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            Endpoint::http("namenode", 50070).url("/webhdfs/v1/a?op=OPEN"),
            "http://namenode:50070/webhdfs/v1/a?op=OPEN"
        );
        assert_eq!(Endpoint::https("::1", 9871).url("/x"), "https://[::1]:9871/x");
        assert_eq!(Endpoint::http("[::1]", 80).url("/x"), "http://[::1]:80/x");
        assert_eq!(Endpoint::http("dn", 9864).to_string(), "dn:9864");
    }

    async fn drain(reader: CountingReader, length: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        reader.take(length).read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_counting_reader_exact_length() {
        let counting = CountingReader::new(Box::new(std::io::Cursor::new(b"hello".to_vec())));
        assert_eq!(drain(counting.clone(), 5).await, b"hello");
        assert_eq!(counting.consumed(), 5);
        assert!(!counting.exhausted());
        counting.check_length(5).await.unwrap();
    }

    #[tokio::test]
    async fn test_counting_reader_longer_than_declared() {
        let counting = CountingReader::new(Box::new(std::io::Cursor::new(vec![b'q'; 20])));
        assert_eq!(drain(counting.clone(), 5).await.len(), 5);

        let err = counting.check_length(5).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Io);
        assert!(err.to_string().contains("more than the declared 5 bytes"));
    }

    #[tokio::test]
    async fn test_counting_reader_shorter_than_declared() {
        let counting = CountingReader::new(Box::new(std::io::Cursor::new(b"abc".to_vec())));
        assert_eq!(drain(counting.clone(), 5).await, b"abc");
        assert!(counting.exhausted());

        let err = counting.check_length(5).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Io);
        assert!(err.to_string().contains("after 3 of 5 declared bytes"));
    }

    #[test]
    fn test_proxy_credentials() {
        let proxy = ProxyConfig::new("127.0.0.1", 3128);
        assert!(!proxy.has_authentication());
        assert!(proxy.credentials.is_none());

        let proxy = proxy.with_credentials("user", "password");
        assert!(proxy.has_authentication());
        let creds = proxy.credentials.as_ref().unwrap();
        assert_eq!(creds.user, "user");
        assert_eq!(creds.password, "password");
        assert!(!format!("{:?}", proxy).contains("password\""));
    }

    #[test]
    fn test_build_client_with_everything() {
        let config = TransportConfig::new()
            .with_proxy(ProxyConfig::new("127.0.0.1", 3128).with_credentials("u", "p"))
            .with_tls(TlsConfig::insecure())
            .with_timeouts(TimeoutConfig::default().with_open_timeout(std::time::Duration::from_secs(5)));
        assert!(config.build_connector().is_ok());
        assert_eq!(config.scheme(), "https");
        assert_eq!(TransportConfig::new().scheme(), "http");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = TransportConfig::new()
            .with_timeouts(TimeoutConfig::new(Some(std::time::Duration::ZERO), None));
        assert!(config.build_client().is_err());
    }

    #[test]
    fn test_response_helpers() {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_static("  "));
        let response = WireResponse { status: 307, headers, body: Bytes::new() };
        assert!(response.is_redirect());
        assert!(response.location().is_none());
        assert!(!TransportConfig::new().is_kerberos_challenge(&response));
    }
}
