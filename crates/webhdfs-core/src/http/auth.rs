//! Kerberos/SPNEGO negotiation
//!
//! The GSSAPI security context itself is supplied by the caller through the
//! [`SecurityContext`] trait. [`KerberosNegotiator`] caches the current
//! token, renders it as an `Authorization: Negotiate` header and feeds
//! server challenges back into the context.

use std::fmt;
use std::sync::Mutex;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use crate::{Error, Result};

/// Authentication scheme used in both directions
pub const NEGOTIATE: &str = "Negotiate";

/// A GSSAPI client security context
pub trait SecurityContext: Send {
    /// Initialize (or continue) the context.
    ///
    /// `input_token` is `None` on the first call and the decoded server token
    /// on re-initialization. Returns the token to send to the server.
    fn init_context(&mut self, input_token: Option<&[u8]>) -> anyhow::Result<Vec<u8>>;
}

struct NegotiationState {
    context: Box<dyn SecurityContext>,
    token: Vec<u8>,
}

/// Shared Negotiate token holder; safe to use from concurrent requests
pub struct KerberosNegotiator {
    service_principal: String,
    state: Mutex<NegotiationState>,
}

impl fmt::Debug for KerberosNegotiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KerberosNegotiator")
            .field("service_principal", &self.service_principal)
            .finish_non_exhaustive()
    }
}

impl KerberosNegotiator {
    /// Create the negotiator and obtain the initial token
    pub fn new(
        service_principal: impl Into<String>,
        mut context: Box<dyn SecurityContext>,
    ) -> Result<Self> {
        let service_principal = service_principal.into();
        let token = context.init_context(None).map_err(|e| Error::Kerberos {
            message: format!("Failed to initialize context for {}: {}", service_principal, e),
            source: Some(e),
        })?;

        Ok(Self {
            service_principal,
            state: Mutex::new(NegotiationState { context, token }),
        })
    }

    /// Service principal for a WebHDFS host, `HTTP@<host>`
    pub fn service_principal_for(host: &str) -> String {
        format!("HTTP@{}", host)
    }

    pub fn service_principal(&self) -> &str {
        &self.service_principal
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, NegotiationState>> {
        self.state
            .lock()
            .map_err(|_| Error::kerberos("Negotiation state poisoned by a panicked request"))
    }

    /// `Negotiate <base64 token>` for the `Authorization` header
    pub fn authorization_header(&self) -> Result<String> {
        let state = self.lock()?;
        Ok(format!("{} {}", NEGOTIATE, STANDARD.encode(&state.token)))
    }

    /// Feed a `WWW-Authenticate` challenge back into the context.
    ///
    /// The last whitespace-separated field of the header is the base64 input
    /// token. A missing header, missing token or undecodable token is an error.
    pub fn handle_challenge(&self, www_authenticate: Option<&str>) -> Result<()> {
        let header = www_authenticate
            .ok_or_else(|| Error::kerberos("Server does not return WWW-Authenticate header"))?;

        let encoded = header
            .split_whitespace()
            .last()
            .filter(|field| !field.eq_ignore_ascii_case(NEGOTIATE))
            .ok_or_else(|| Error::kerberos(format!("Malformed Negotiate challenge: {:?}", header)))?;

        let input = STANDARD.decode(encoded).map_err(|e| Error::Kerberos {
            message: format!("Challenge token is not valid base64: {}", e),
            source: Some(e.into()),
        })?;

        let mut state = self.lock()?;
        let token = state.context.init_context(Some(&input)).map_err(|e| Error::Kerberos {
            message: format!("Context re-initialization failed: {}", e),
            source: Some(e),
        })?;
        state.token = token;
        tracing::debug!(principal = %self.service_principal, "refreshed Negotiate token");
        Ok(())
    }
}
