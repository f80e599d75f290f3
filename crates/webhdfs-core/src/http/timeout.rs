//! Connection timeouts
//!
//! Open and read timeouts are independent and both optional; an unset value
//! leaves the transport default in place.

use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Timeout configuration for WebHDFS connections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Time allowed to establish a connection
    pub open_timeout: Option<Duration>,
    /// Time allowed between reads of response data
    pub read_timeout: Option<Duration>,
}

impl TimeoutConfig {
    pub fn new(open_timeout: Option<Duration>, read_timeout: Option<Duration>) -> Self {
        Self {
            open_timeout,
            read_timeout,
        }
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = Some(timeout);
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Apply to a reqwest client builder
    pub fn apply_to(&self, mut builder: reqwest::ClientBuilder) -> reqwest::ClientBuilder {
        if let Some(open) = self.open_timeout {
            builder = builder.connect_timeout(open);
        }
        if let Some(read) = self.read_timeout {
            builder = builder.read_timeout(read);
        }
        builder
    }

    /// Zero timeouts would fail every request
    pub fn validate(&self) -> Result<(), String> {
        if self.open_timeout.is_some_and(|t| t.is_zero()) {
            return Err("Open timeout cannot be zero".to_string());
        }
        if self.read_timeout.is_some_and(|t| t.is_zero()) {
            return Err("Read timeout cannot be zero".to_string());
        }
        Ok(())
    }
}
