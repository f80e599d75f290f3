//! Error types for the WebHDFS request engine
//!
//! Every failure the engine can surface is a variant of [`Error`]. Variants
//! produced from an HTTP response carry the status code and the cleaned
//! response body so callers never have to inspect raw responses.

use std::fmt;
use thiserror::Error;
use serde::{Deserialize, Serialize};

/// Main error type for WebHDFS operations
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown or disallowed option keys, or a malformed request (HTTP 400)
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        /// Offending option keys, empty when raised from an HTTP 400
        keys: Vec<String>,
        status_code: Option<u16>,
    },

    /// Operation name not present in the catalog
    #[error("Unknown operation: {name}")]
    UnknownOperation { name: String },

    /// HTTP 401
    #[error("Authentication failed [{status_code}]: {message}")]
    Auth { status_code: u16, message: String },

    /// HTTP 403
    #[error("Permission denied [{status_code}]: {message}")]
    Permission { status_code: u16, message: String },

    /// HTTP 404
    #[error("Not found [{status_code}]: {message}")]
    NotFound { status_code: u16, message: String },

    /// HTTP 500
    #[error("Server error [{status_code}]: {message}")]
    Server { status_code: u16, message: String },

    /// Missing/unexpected redirect or an unrecognized status code
    #[error("Protocol error: {message}")]
    Protocol {
        message: String,
        status_code: Option<u16>,
    },

    /// Negotiate challenge or security context failure
    #[error("Kerberos error: {message}")]
    Kerberos {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Connection open/read/write failure
    #[error("Transport error talking to {host}:{port}: {message}")]
    Transport {
        host: String,
        port: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid client configuration
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// JSON parsing errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// The caller cancelled the operation
    #[error("Operation cancelled: {message}")]
    Cancelled { message: String },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    UnknownOperation,
    Auth,
    Permission,
    NotFound,
    Server,
    Protocol,
    Kerberos,
    Transport,
    Configuration,
    Json,
    Io,
    Cancelled,
}

impl Error {
    /// The kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::Validation,
            Error::UnknownOperation { .. } => ErrorKind::UnknownOperation,
            Error::Auth { .. } => ErrorKind::Auth,
            Error::Permission { .. } => ErrorKind::Permission,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Server { .. } => ErrorKind::Server,
            Error::Protocol { .. } => ErrorKind::Protocol,
            Error::Kerberos { .. } => ErrorKind::Kerberos,
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Configuration { .. } => ErrorKind::Configuration,
            Error::Json { .. } => ErrorKind::Json,
            Error::Io { .. } => ErrorKind::Io,
            Error::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// HTTP status code of the response that produced this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Validation { status_code, .. } | Error::Protocol { status_code, .. } => {
                *status_code
            }
            Error::Auth { status_code, .. }
            | Error::Permission { status_code, .. }
            | Error::NotFound { status_code, .. }
            | Error::Server { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn protocol(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Error::Protocol {
            message: message.into(),
            status_code,
        }
    }

    pub(crate) fn kerberos(message: impl Into<String>) -> Self {
        Error::Kerberos {
            message: message.into(),
            source: None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::UnknownOperation => "UnknownOperationError",
            ErrorKind::Auth => "AuthError",
            ErrorKind::Permission => "PermissionError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Server => "ServerError",
            ErrorKind::Protocol => "ProtocolError",
            ErrorKind::Kerberos => "KerberosError",
            ErrorKind::Transport => "TransportError",
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::Json => "JsonError",
            ErrorKind::Io => "IoError",
            ErrorKind::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

// Conversion implementations
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}
