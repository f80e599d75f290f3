//! Client configuration
//!
//! This module handles loading and merging configuration from:
//! - Default values
//! - TOML configuration files
//! - `WEBHDFS_*` environment variables
//!
//! Kerberos security contexts cannot be described in a file; attach one to
//! the builder returned by [`ClientConfig::into_builder`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::client::{WebHdfsClientBuilder, DEFAULT_HOST, DEFAULT_PORT};
use crate::http::retry::RetryPolicy;
use crate::http::timeout::TimeoutConfig;
use crate::http::tls::{TlsConfig, TlsVersion, VerifyMode};
use crate::http::transport::ProxyConfig;
use crate::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// NameNode (or HttpFS gateway) host
    pub host: String,

    /// NameNode (or HttpFS gateway) HTTP port
    pub port: u16,

    /// Sent as `user.name`
    pub username: Option<String>,

    /// Sent as `doas`
    pub doas: Option<String>,

    /// Talk to an HttpFS gateway instead of a NameNode
    pub httpfs_mode: bool,

    pub retry: RetrySettings,

    pub timeouts: TimeoutSettings,

    pub proxy: Option<ProxySettings>,

    pub tls: Option<TlsSettings>,

    /// Additional headers sent with every request
    pub headers: BTreeMap<String, String>,
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub enabled: bool,

    /// Attempts per phase, the first one included; `3` means up to two
    /// retries. Not a retry count.
    pub max_attempts: u32,

    /// Seconds between attempts; zero or less means no sleep
    pub interval_secs: f64,
}

/// Timeout configuration, in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub open_secs: Option<f64>,
    pub read_secs: Option<f64>,
}

/// Proxy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxySettings {
    pub address: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// TLS configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
    pub ca_file: Option<PathBuf>,

    /// `none` or `peer`
    pub verify_mode: Option<String>,

    /// Client certificate (PEM)
    pub cert: Option<PathBuf>,

    /// Client private key (PEM)
    pub key: Option<PathBuf>,

    /// e.g. `TLSv1.2`
    pub version: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            username: None,
            doas: None,
            httpfs_mode: false,
            retry: RetrySettings::default(),
            timeouts: TimeoutSettings::default(),
            proxy: None,
            tls: None,
            headers: BTreeMap::new(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 1,
            interval_secs: 1.0,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Io {
            message: format!("Failed to read config {}: {}", path.display(), e),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| Error::Configuration {
            message: format!("Invalid config {}: {}", path.display(), e),
            source: Some(e.into()),
        })
    }

    /// Override fields from `WEBHDFS_*` environment variables.
    ///
    /// `WEBHDFS_RETRY_MAX_ATTEMPTS` enables retries and sets the attempts per
    /// phase, the first one included.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(host) = env_var("WEBHDFS_HOST") {
            self.host = host;
        }
        if let Some(port) = env_parse::<u16>("WEBHDFS_PORT")? {
            self.port = port;
        }
        if let Some(user) = env_var("WEBHDFS_USER") {
            self.username = Some(user);
        }
        if let Some(doas) = env_var("WEBHDFS_DOAS") {
            self.doas = Some(doas);
        }
        if let Some(value) = env_var("WEBHDFS_HTTPFS") {
            self.httpfs_mode = parse_flag("WEBHDFS_HTTPFS", &value)?;
        }
        if let Some(attempts) = env_parse::<u32>("WEBHDFS_RETRY_MAX_ATTEMPTS")? {
            self.retry.enabled = true;
            self.retry.max_attempts = attempts;
        }
        if let Some(interval) = env_parse::<f64>("WEBHDFS_RETRY_INTERVAL")? {
            self.retry.interval_secs = interval;
        }
        Ok(())
    }

    /// Load `path` (or defaults) and apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::configuration("host must not be empty"));
        }
        if self.port == 0 {
            return Err(Error::configuration("port must not be 0"));
        }
        if self.retry.enabled && self.retry.max_attempts == 0 {
            return Err(Error::configuration("retry.max_attempts must be at least 1"));
        }
        let timeouts = [("open_secs", self.timeouts.open_secs), ("read_secs", self.timeouts.read_secs)];
        for (name, value) in timeouts {
            if let Some(secs) = value {
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(Error::configuration(format!(
                        "timeouts.{} must be a positive number of seconds",
                        name
                    )));
                }
            }
        }
        if let Some(proxy) = &self.proxy {
            if proxy.password.is_some() && proxy.user.is_none() {
                return Err(Error::configuration("proxy.password given without proxy.user"));
            }
        }
        if let Some(tls) = &self.tls {
            tls.to_tls_config()?.validate().map_err(|e| Error::Configuration {
                message: e.to_string(),
                source: Some(e.into()),
            })?;
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        if self.retry.enabled {
            RetryPolicy::new(self.retry.max_attempts).with_interval_secs(self.retry.interval_secs)
        } else {
            RetryPolicy::disabled().with_interval_secs(self.retry.interval_secs)
        }
    }

    pub fn timeout_config(&self) -> TimeoutConfig {
        TimeoutConfig::new(
            self.timeouts.open_secs.and_then(seconds),
            self.timeouts.read_secs.and_then(seconds),
        )
    }

    /// Validate and turn into a client builder
    pub fn into_builder(self) -> Result<WebHdfsClientBuilder> {
        self.validate()?;

        let mut builder = WebHdfsClientBuilder::new(self.host.clone(), self.port)
            .retry(self.retry_policy())
            .timeouts(self.timeout_config())
            .httpfs_mode(self.httpfs_mode);

        if let Some(username) = self.username {
            builder = builder.username(username);
        }
        if let Some(doas) = self.doas {
            builder = builder.doas(doas);
        }
        if let Some(proxy) = self.proxy {
            builder = builder.proxy(proxy.into_proxy_config());
        }
        if let Some(tls) = &self.tls {
            builder = builder.tls(tls.to_tls_config()?);
        }
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }

        Ok(builder)
    }
}

impl ProxySettings {
    fn into_proxy_config(self) -> ProxyConfig {
        let proxy = ProxyConfig::new(self.address, self.port);
        match self.user {
            Some(user) => proxy.with_credentials(user, self.password.unwrap_or_default()),
            None => proxy,
        }
    }
}

impl TlsSettings {
    fn to_tls_config(&self) -> Result<TlsConfig> {
        let mut config = TlsConfig::secure();
        config.ca_file = self.ca_file.clone();
        config.client_cert = self.cert.clone();
        config.client_key = self.key.clone();
        if let Some(mode) = &self.verify_mode {
            config.verify_mode = VerifyMode::from_str(mode)?;
        }
        if let Some(version) = &self.version {
            config.version = Some(TlsVersion::from_str(version)?);
        }
        Ok(config)
    }
}

fn seconds(secs: f64) -> Option<Duration> {
    (secs.is_finite() && secs > 0.0).then(|| Duration::from_secs_f64(secs))
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var(name)
        .map(|value| {
            value.trim().parse::<T>().map_err(|e| {
                Error::configuration(format!("Invalid {}={:?}: {}", name, value, e))
            })
        })
        .transpose()
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::configuration(format!("Invalid {}={:?}, expected a boolean", name, value))),
    }
}
