//! TLS configuration for WebHDFS connections
//!
//! Supports a custom CA bundle, switching peer verification off, a client
//! certificate/key pair for mutual TLS, and pinning the protocol version.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::{Error, Result};

/// Whether the server certificate chain is verified
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyMode {
    /// Accept any server certificate
    None,
    /// Verify the peer certificate chain and hostname
    #[default]
    Peer,
}

impl FromStr for VerifyMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(VerifyMode::None),
            "peer" => Ok(VerifyMode::Peer),
            other => Err(Error::configuration(format!(
                "Invalid SSL verify mode {:?}, expected \"none\" or \"peer\"",
                other
            ))),
        }
    }
}

impl fmt::Display for VerifyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyMode::None => write!(f, "none"),
            VerifyMode::Peer => write!(f, "peer"),
        }
    }
}

/// TLS protocol versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TlsVersion {
    /// TLS 1.0 (deprecated, not recommended)
    TLS1_0,
    /// TLS 1.1 (deprecated, not recommended)
    TLS1_1,
    /// TLS 1.2
    TLS1_2,
    /// TLS 1.3
    TLS1_3,
}

impl TlsVersion {
    /// Convert to the reqwest representation
    pub fn to_reqwest_version(self) -> reqwest::tls::Version {
        match self {
            TlsVersion::TLS1_0 => reqwest::tls::Version::TLS_1_0,
            TlsVersion::TLS1_1 => reqwest::tls::Version::TLS_1_1,
            TlsVersion::TLS1_2 => reqwest::tls::Version::TLS_1_2,
            TlsVersion::TLS1_3 => reqwest::tls::Version::TLS_1_3,
        }
    }
}

impl FromStr for TlsVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(|c: char| c == 'v' || c == '_', ".").as_str() {
            "tls1.0" | "tls.1.0" | "1.0" => Ok(TlsVersion::TLS1_0),
            "tls1.1" | "tls.1.1" | "1.1" => Ok(TlsVersion::TLS1_1),
            "tls1.2" | "tls.1.2" | "1.2" => Ok(TlsVersion::TLS1_2),
            "tls1.3" | "tls.1.3" | "1.3" => Ok(TlsVersion::TLS1_3),
            _ => Err(Error::configuration(format!("Unsupported TLS version {:?}", s))),
        }
    }
}

/// TLS/HTTPS configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// CA bundle (PEM) used to verify the server
    pub ca_file: Option<PathBuf>,
    pub verify_mode: VerifyMode,
    /// Client certificate (PEM) for mutual TLS
    pub client_cert: Option<PathBuf>,
    /// Client private key (PEM) for mutual TLS
    pub client_key: Option<PathBuf>,
    /// Pin the protocol to exactly this version
    pub version: Option<TlsVersion>,
}

impl TlsConfig {
    /// Verifying configuration using the platform roots
    pub fn secure() -> Self {
        Self::default()
    }

    /// Configuration that skips certificate verification
    pub fn insecure() -> Self {
        Self {
            verify_mode: VerifyMode::None,
            ..Self::default()
        }
    }

    pub fn with_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    pub fn with_verify_mode(mut self, mode: VerifyMode) -> Self {
        self.verify_mode = mode;
        self
    }

    pub fn with_client_cert(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.client_cert = Some(cert.into());
        self.client_key = Some(key.into());
        self
    }

    pub fn with_version(mut self, version: TlsVersion) -> Self {
        self.version = Some(version);
        self
    }

    /// Validate the TLS configuration
    pub fn validate(&self) -> std::result::Result<(), TlsConfigError> {
        match (&self.client_cert, &self.client_key) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(TlsConfigError::IncompleteClientCert);
            }
            _ => {}
        }

        if let Some(ca) = &self.ca_file {
            if !ca.exists() {
                return Err(TlsConfigError::CaFileNotFound(ca.clone()));
            }
        }

        if let Some(cert) = &self.client_cert {
            if !cert.exists() {
                return Err(TlsConfigError::ClientCertFileNotFound(cert.clone()));
            }
        }

        if let Some(key) = &self.client_key {
            if !key.exists() {
                return Err(TlsConfigError::ClientKeyFileNotFound(key.clone()));
            }
        }

        Ok(())
    }

    pub fn has_client_cert(&self) -> bool {
        self.client_cert.is_some() && self.client_key.is_some()
    }

    /// Apply to a reqwest client builder
    pub fn apply_to(&self, builder: reqwest::ClientBuilder) -> Result<reqwest::ClientBuilder> {
        self.validate().map_err(|e| Error::Configuration {
            message: e.to_string(),
            source: Some(e.into()),
        })?;

        let mut builder = builder
            .use_rustls_tls()
            .danger_accept_invalid_certs(self.verify_mode == VerifyMode::None);

        if let Some(ca) = &self.ca_file {
            let pem = read_pem(ca)?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| Error::Configuration {
                message: format!("Invalid CA file {}: {}", ca.display(), e),
                source: Some(e.into()),
            })?;
            builder = builder.add_root_certificate(cert);
        }

        if let (Some(cert), Some(key)) = (&self.client_cert, &self.client_key) {
            let mut pem = read_pem(key)?;
            pem.extend_from_slice(b"\n");
            pem.extend_from_slice(&read_pem(cert)?);
            let identity = reqwest::Identity::from_pem(&pem).map_err(|e| Error::Configuration {
                message: format!("Invalid client certificate {}: {}", cert.display(), e),
                source: Some(e.into()),
            })?;
            builder = builder.identity(identity);
        }

        if let Some(version) = self.version {
            builder = builder
                .min_tls_version(version.to_reqwest_version())
                .max_tls_version(version.to_reqwest_version());
        }

        Ok(builder)
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::Io {
        message: format!("Failed to read {}: {}", path.display(), e),
        source: e,
    })
}

/// TLS configuration errors
#[derive(Debug, thiserror::Error)]
pub enum TlsConfigError {
    #[error("Incomplete client certificate configuration: both cert and key paths must be provided")]
    IncompleteClientCert,

    #[error("CA file not found: {0:?}")]
    CaFileNotFound(PathBuf),

    #[error("Client certificate file not found: {0:?}")]
    ClientCertFileNotFound(PathBuf),

    #[error("Client key file not found: {0:?}")]
    ClientKeyFileNotFound(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_tls_config_default() {
        let config = TlsConfig::default();
        assert_eq!(config.verify_mode, VerifyMode::Peer);
        assert!(config.ca_file.is_none());
        assert!(config.version.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_verify_mode_parsing() {
        assert_eq!("none".parse::<VerifyMode>().unwrap(), VerifyMode::None);
        assert_eq!("peer".parse::<VerifyMode>().unwrap(), VerifyMode::Peer);
        for invalid in ["no", "pee", "yes", ""] {
            assert!(invalid.parse::<VerifyMode>().is_err(), "{invalid}");
        }
    }

    #[test]
    fn test_tls_version_parsing_and_ordering() {
        assert_eq!("TLSv1.2".parse::<TlsVersion>().unwrap(), TlsVersion::TLS1_2);
        assert_eq!("1.3".parse::<TlsVersion>().unwrap(), TlsVersion::TLS1_3);
        assert_eq!("tls1_1".parse::<TlsVersion>().unwrap(), TlsVersion::TLS1_1);
        assert!("SSLv3".parse::<TlsVersion>().is_err());
        assert!(TlsVersion::TLS1_0 < TlsVersion::TLS1_3);
    }

    #[test]
    fn test_incomplete_client_cert() {
        let mut config = TlsConfig::default();
        config.client_cert = Some(PathBuf::from("cert.pem"));
        assert!(matches!(config.validate(), Err(TlsConfigError::IncompleteClientCert)));
    }

    #[test]
    fn test_missing_ca_file() {
        let config = TlsConfig::secure().with_ca_file("/definitely/not/here.pem");
        assert!(matches!(config.validate(), Err(TlsConfigError::CaFileNotFound(_))));
        assert!(config.apply_to(reqwest::Client::builder()).is_err());
    }

    #[test]
    fn test_existing_files_validate() {
        let cert = NamedTempFile::new().unwrap();
        let key = NamedTempFile::new().unwrap();
        let config = TlsConfig::insecure().with_client_cert(cert.path(), key.path());
        assert!(config.validate().is_ok());
        assert!(config.has_client_cert());
    }

    #[test]
    fn test_insecure_builds() {
        let builder = TlsConfig::insecure().apply_to(reqwest::Client::builder()).unwrap();
        assert!(builder.build().is_ok());
    }
}
