//! Request execution
//!
//! Drives one logical WebHDFS operation: validate options, build the target,
//! then either a single exchange with the NameNode or the two-phase
//! NameNode -> DataNode redirect. Each phase retries allow-listed remote
//! exceptions in a bounded loop and answers Kerberos challenges at most once.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use url::Url;
use crate::http::builder::{Identity, RequestBuilder};
use crate::http::catalog::{OperationCatalog, Options};
use crate::http::error::{classify, clean_message};
use crate::http::payload::{OperationResponse, Payload, PayloadSlot, OCTET_STREAM};
use crate::http::retry::{RetryDecision, RetryPolicy};
use crate::http::transport::{Connector, Endpoint, TransportConfig, WireRequest, WireResponse};
use crate::{Error, Result};

/// One logical operation as handed to the executor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationRequest {
    /// Catalog name, e.g. `CREATE`
    pub operation: String,
    /// Filesystem path, without the `/webhdfs/v1` prefix
    pub path: String,
    /// Caller options, validated against the catalog
    pub options: Options,
    /// Parameters injected by the dispatch layer; not validated
    pub params: Options,
}

impl OperationRequest {
    pub fn new(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Executor states, reported through tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Building,
    AwaitingResponse,
    RedirectPending,
    Retrying,
    Succeeded,
    Failed,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Single exchange with the NameNode
    Single,
    /// Phase 1: ask the NameNode where the data lives
    Locate,
    /// Phase 2: move the bytes to/from the DataNode
    Transfer,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Single => write!(f, "single"),
            Phase::Locate => write!(f, "phase-1"),
            Phase::Transfer => write!(f, "phase-2"),
        }
    }
}

/// Where phase 2 goes, parsed from the `Location` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub endpoint: Endpoint,
    pub path: String,
    pub query: Option<String>,
}

impl RedirectTarget {
    pub fn parse(location: &str) -> Result<Self> {
        let url = Url::parse(location).map_err(|e| {
            Error::protocol(format!("Unparseable Location header {:?}: {}", location, e), None)
        })?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::protocol(format!("Location {:?} has no host", location), None))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| Error::protocol(format!("Location {:?} has no port", location), None))?;

        Ok(Self {
            endpoint: Endpoint::new(url.scheme(), host, port),
            path: url.path().to_string(),
            query: url.query().map(str::to_string),
        })
    }

    /// `path?query`, or the bare path when the Location had no query
    pub fn target(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }
}

/// Turns [`OperationRequest`]s into HTTP exchanges
pub struct RequestExecutor {
    namenode: Endpoint,
    builder: RequestBuilder,
    transport: TransportConfig,
    connector: Arc<dyn Connector>,
    retry: RetryPolicy,
    httpfs_mode: bool,
    default_headers: HeaderMap,
}

impl fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("namenode", &self.namenode)
            .field("identity", self.builder.identity())
            .field("retry", &self.retry)
            .field("httpfs_mode", &self.httpfs_mode)
            .finish_non_exhaustive()
    }
}

impl RequestExecutor {
    pub fn new(
        namenode: Endpoint,
        identity: Identity,
        transport: TransportConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            namenode,
            builder: RequestBuilder::new(identity),
            transport,
            connector,
            retry: RetryPolicy::default(),
            httpfs_mode: false,
            default_headers: HeaderMap::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// HttpFS gateways serve data directly, without the redirect
    pub fn with_httpfs_mode(mut self, httpfs_mode: bool) -> Self {
        self.httpfs_mode = httpfs_mode;
        self
    }

    /// Header sent with every request
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::configuration(format!("Invalid header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::configuration(format!("Invalid value for header {}: {}", name, e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    pub fn namenode(&self) -> &Endpoint {
        &self.namenode
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn is_httpfs_mode(&self) -> bool {
        self.httpfs_mode
    }

    /// Execute without a caller-held cancellation token
    pub async fn execute(
        &self,
        request: OperationRequest,
        payload: Option<Payload>,
    ) -> Result<OperationResponse> {
        self.execute_with_cancel(request, payload, &CancellationToken::new())
            .await
    }

    /// Execute, aborting with [`Error::Cancelled`] as soon as `cancel` fires
    pub async fn execute_with_cancel(
        &self,
        request: OperationRequest,
        payload: Option<Payload>,
        cancel: &CancellationToken,
    ) -> Result<OperationResponse> {
        let spec = OperationCatalog::global().get(&request.operation)?;
        spec.validate(&request.options)?;

        let built = self
            .builder
            .build(&request.path, spec.name, &request.options, &request.params)?;
        let target = built.target();
        debug!(op = spec.name, %target, state = %ExecutionState::Building, "built request");

        let mut payload = PayloadSlot::new(payload);

        let response = if spec.requires_redirect && !self.httpfs_mode {
            let mut no_payload = PayloadSlot::default();
            let located = self
                .run_phase(
                    Phase::Locate,
                    &self.namenode,
                    &spec.method,
                    &target,
                    false,
                    &mut no_payload,
                    cancel,
                )
                .await?;

            let redirect = redirect_target(&located)?;
            debug!(
                op = spec.name,
                datanode = %redirect.endpoint,
                state = %ExecutionState::RedirectPending,
                "following redirect"
            );

            self.run_phase(
                Phase::Transfer,
                &redirect.endpoint,
                &spec.method,
                &redirect.target(),
                true,
                &mut payload,
                cancel,
            )
            .await?
        } else {
            let upload = self.httpfs_mode && payload.is_some();
            self.run_phase(
                Phase::Single,
                &self.namenode,
                &spec.method,
                &target,
                upload,
                &mut payload,
                cancel,
            )
            .await?
        };

        debug!(
            op = spec.name,
            status = response.status,
            state = %ExecutionState::Succeeded,
            "operation finished"
        );
        Ok(OperationResponse {
            status: response.status,
            headers: response.headers,
            body: response.body,
        })
    }

    /// One phase: send, answer a Kerberos challenge, retry known transient
    /// failures. Returns any 2xx/3xx response; classifies everything else.
    #[allow(clippy::too_many_arguments)]
    async fn run_phase(
        &self,
        phase: Phase,
        endpoint: &Endpoint,
        method: &Method,
        target: &str,
        octet_stream: bool,
        payload: &mut PayloadSlot,
        cancel: &CancellationToken,
    ) -> Result<WireResponse> {
        let mut attempt: u32 = 1;
        let mut negotiated = false;

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(phase, endpoint));
            }

            let body = payload.for_attempt();
            let had_payload = body.is_some();
            let headers = self.phase_headers(body.as_ref(), octet_stream)?;

            debug!(
                %phase,
                %endpoint,
                %method,
                attempt,
                state = %ExecutionState::AwaitingResponse,
                "sending request"
            );
            let connection = self.connector.open(endpoint)?;
            let request = WireRequest {
                method: method.clone(),
                target: target.to_string(),
                headers,
                body,
            };

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(phase, endpoint)),
                result = connection.send(request) => result?,
            };

            if self.transport.kerberos.is_some() && response.status == 307 {
                if self.transport.is_kerberos_challenge(&response) {
                    warn!(%phase, %endpoint, "Negotiate challenge received, refreshing token");
                    self.transport.handle_challenge(&response)?;
                    if response.location().is_none() {
                        if negotiated {
                            return Err(Error::kerberos(format!(
                                "{} repeated the Negotiate challenge after a token refresh",
                                endpoint
                            )));
                        }
                        if !payload.can_replay(had_payload) {
                            return Err(Error::kerberos(
                                "Negotiate challenge on a streamed upload that cannot be re-sent",
                            ));
                        }
                        negotiated = true;
                        continue;
                    }
                } else if response.location().is_none() {
                    return Err(Error::kerberos("Server does not return WWW-Authenticate header"));
                }
            }

            if response.is_success() || response.is_redirect() {
                return Ok(response);
            }

            match self.retry.decide(attempt, &response.body) {
                RetryDecision::Retry { delay, exception } if payload.can_replay(had_payload) => {
                    warn!(
                        %phase,
                        %endpoint,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        %exception,
                        ?delay,
                        state = %ExecutionState::Retrying,
                        "transient remote exception, retrying"
                    );
                    sleep_unless_cancelled(delay, cancel, phase, endpoint).await?;
                    attempt += 1;
                }
                _ => {
                    let error = classify(response.status, &response.body);
                    if attempt > 1 {
                        error!(
                            %phase,
                            %endpoint,
                            attempt,
                            %error,
                            state = %ExecutionState::Failed,
                            "giving up after retries"
                        );
                    } else {
                        debug!(
                            %phase,
                            %endpoint,
                            %error,
                            state = %ExecutionState::Failed,
                            "request failed"
                        );
                    }
                    return Err(error);
                }
            }
        }
    }

    fn phase_headers(&self, body: Option<&Payload>, octet_stream: bool) -> Result<HeaderMap> {
        let mut headers = self.default_headers.clone();
        self.transport.apply_auth_headers(&mut headers)?;
        if octet_stream {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(OCTET_STREAM));
        }
        if let Some(body) = body {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }
        Ok(headers)
    }
}

fn redirect_target(response: &WireResponse) -> Result<RedirectTarget> {
    match response.location() {
        Some(location) if response.is_redirect() => RedirectTarget::parse(location),
        _ => Err(Error::protocol(
            format!(
                "NameNode returns non-redirection (or without location header), code: {}, body: {}",
                response.status,
                clean_message(&response.body)
            ),
            Some(response.status),
        )),
    }
}

async fn sleep_unless_cancelled(
    delay: Duration,
    cancel: &CancellationToken,
    phase: Phase,
    endpoint: &Endpoint,
) -> Result<()> {
    if delay.is_zero() {
        return Ok(());
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(cancelled(phase, endpoint)),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

fn cancelled(phase: Phase, endpoint: &Endpoint) -> Error {
    Error::Cancelled {
        message: format!("{} request to {} cancelled", phase, endpoint),
    }
}
