//! HTTP error classification
//!
//! Maps a non-success WebHDFS response to a typed [`Error`] and extracts the
//! `RemoteException` envelope the NameNode/DataNode put in error bodies.

use serde::{Deserialize, Serialize};
use crate::{Error, ErrorKind};

/// Message used when the server returns an empty error body
pub const EMPTY_BODY_PLACEHOLDER: &str = "(empty response body)";

/// Server-reported exception carried in an error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteException {
    /// Short exception type name, e.g. `LeaseExpiredException`
    pub exception: String,
    #[serde(rename = "javaClassName", default)]
    pub java_class_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteExceptionEnvelope {
    #[serde(rename = "RemoteException")]
    remote_exception: RemoteException,
}

impl RemoteException {
    /// Parse `{"RemoteException": {...}}`; `None` for anything else
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice::<RemoteExceptionEnvelope>(body)
            .ok()
            .map(|envelope| envelope.remote_exception)
    }
}

impl ErrorKind {
    /// Classify a non-2xx/3xx status code
    pub fn from_status(status: u16) -> ErrorKind {
        match status {
            400 => ErrorKind::Validation,
            401 => ErrorKind::Auth,
            403 => ErrorKind::Permission,
            404 => ErrorKind::NotFound,
            500 => ErrorKind::Server,
            _ => ErrorKind::Protocol,
        }
    }
}

/// Response body with line breaks removed, or a placeholder when empty
pub fn clean_message(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let cleaned: String = text.chars().filter(|c| *c != '\n' && *c != '\r').collect();
    if cleaned.trim().is_empty() {
        EMPTY_BODY_PLACEHOLDER.to_string()
    } else {
        cleaned
    }
}

/// Turn a failed response into a typed error
pub fn classify(status: u16, body: &[u8]) -> Error {
    let message = clean_message(body);
    match ErrorKind::from_status(status) {
        ErrorKind::Validation => Error::Validation {
            message,
            keys: Vec::new(),
            status_code: Some(status),
        },
        ErrorKind::Auth => Error::Auth { status_code: status, message },
        ErrorKind::Permission => Error::Permission { status_code: status, message },
        ErrorKind::NotFound => Error::NotFound { status_code: status, message },
        ErrorKind::Server => Error::Server { status_code: status, message },
        _ => Error::Protocol {
            message: format!("unexpected response code {}: {}", status, message),
            status_code: Some(status),
        },
    }
}
