//! Retry policy for known-transient remote exceptions
//!
//! Only responses whose body names an allow-listed `RemoteException` are
//! retried. Everything else is terminal.

use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::http::error::RemoteException;

/// Remote exceptions that are safe to retry
pub const DEFAULT_KNOWN_EXCEPTIONS: &[&str] = &["LeaseExpiredException"];

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries are off unless explicitly enabled
    pub enabled: bool,
    /// Total attempts per phase, including the first one
    pub max_attempts: u32,
    /// Delay between attempts
    pub interval: Duration,
    /// `RemoteException.exception` names that trigger a retry
    pub known_exceptions: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 1,
            interval: Duration::from_secs(1),
            known_exceptions: DEFAULT_KNOWN_EXCEPTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RetryPolicy {
    /// Enabled policy allowing `max_attempts` total attempts
    pub fn new(max_attempts: u32) -> Self {
        Self {
            enabled: true,
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    /// Disabled policy
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Interval from fractional seconds; zero, negative or non-finite means no sleep
    pub fn with_interval_secs(mut self, seconds: f64) -> Self {
        self.interval = if seconds.is_finite() && seconds > 0.0 {
            Duration::from_secs_f64(seconds)
        } else {
            Duration::ZERO
        };
        self
    }

    pub fn with_known_exception(mut self, name: impl Into<String>) -> Self {
        self.known_exceptions.push(name.into());
        self
    }

    fn is_known(&self, exception: &str) -> bool {
        self.known_exceptions.iter().any(|known| known == exception)
    }

    /// Decide whether the failed attempt number `attempt` (1-based) with
    /// response `body` is retried
    pub fn decide(&self, attempt: u32, body: &[u8]) -> RetryDecision {
        if !self.enabled || attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }

        match RemoteException::parse(body) {
            Some(remote) if self.is_known(&remote.exception) => RetryDecision::Retry {
                delay: self.interval,
                exception: remote.exception,
            },
            _ => RetryDecision::NoRetry,
        }
    }
}

/// Decision on whether to retry a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the same phase after `delay` (zero means no sleep)
    Retry { delay: Duration, exception: String },
    /// Surface the failure
    NoRetry,
}
