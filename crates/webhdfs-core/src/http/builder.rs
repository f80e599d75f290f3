//! Wire path and query construction for WebHDFS operations
//!
//! Every operation request is addressed as `/webhdfs/v1<path>?op=<OP>&...`.
//! Identity parameters (`user.name`, `doas`) are injected on every request.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use url::form_urlencoded;
use crate::http::catalog::Options;
use crate::{Error, Result};

/// Prefix of every WebHDFS REST path
pub const API_PREFIX: &str = "/webhdfs/v1";

/// Query keys owned by the engine; callers cannot override them
const RESERVED_KEYS: [&str; 3] = ["op", "user.name", "doas"];

/// Bytes escaped inside a path segment; `%` included so names are never
/// read back as escapes
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}')
    .add(b'[')
    .add(b']');

/// Principal and impersonated principal sent as query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Sent as `user.name`
    pub user: Option<String>,
    /// Sent as `doas`
    pub doas: Option<String>,
}

impl Identity {
    pub fn new(user: Option<String>, doas: Option<String>) -> Self {
        Self { user, doas }
    }

    pub fn user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            doas: None,
        }
    }

    pub fn with_doas(mut self, doas: impl Into<String>) -> Self {
        self.doas = Some(doas.into());
        self
    }
}

/// Encoded path and query ready to be put on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltRequest {
    pub path: String,
    pub query: String,
}

impl BuiltRequest {
    /// `path?query` as sent in the request line
    pub fn target(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }
}

/// Builder for WebHDFS request targets
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    identity: Identity,
}

impl RequestBuilder {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Build the wire path and query for `operation` on `path`.
    ///
    /// `params` are injected by the dispatch layer after option validation
    /// and win over `options` on key collision. `op`, `user.name` and `doas`
    /// are always taken from the operation and identity.
    pub fn build(
        &self,
        path: &str,
        operation: &str,
        options: &Options,
        params: &Options,
    ) -> Result<BuiltRequest> {
        let path = encode_path(&api_path(path))?;

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        serializer.append_pair("op", operation);
        if let Some(user) = &self.identity.user {
            serializer.append_pair("user.name", user);
        }
        if let Some(doas) = &self.identity.doas {
            serializer.append_pair("doas", doas);
        }

        let mut merged: BTreeMap<&str, &str> = BTreeMap::new();
        for (key, value) in options.iter().chain(params.iter()) {
            if !RESERVED_KEYS.contains(&key.as_str()) {
                merged.insert(key, value);
            }
        }
        for (key, value) in merged {
            serializer.append_pair(key, value);
        }

        Ok(BuiltRequest {
            path,
            query: serializer.finish(),
        })
    }

    /// Rename destinations are always absolute
    pub fn normalize_destination(destination: &str) -> String {
        if destination.starts_with('/') {
            destination.to_string()
        } else {
            format!("/{}", destination)
        }
    }
}

/// Prefix a filesystem path with the REST API root.
///
/// The prefix is applied unconditionally: a path that already starts with
/// `/webhdfs/v1` is prefixed again.
pub fn api_path(path: &str) -> String {
    if path.starts_with('/') {
        format!("{}{}", API_PREFIX, path)
    } else {
        format!("{}/{}", API_PREFIX, path)
    }
}

/// Percent-encode a path segment by segment, keeping `/` as the separator.
///
/// `.` and `..` segments are rejected: a server would resolve them and
/// address a different file than the one named.
pub fn encode_path(path: &str) -> Result<String> {
    if let Some(segment) = path.split('/').find(|s| *s == "." || *s == "..") {
        return Err(Error::Validation {
            message: format!("path segment {:?} is not allowed in {}", segment, path),
            keys: Vec::new(),
            status_code: None,
        });
    }

    let encoded: Vec<String> = path
        .split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect();
    Ok(encoded.join("/"))
}
