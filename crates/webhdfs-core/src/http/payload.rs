//! Upload payloads and buffered responses

use std::fmt;
use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use serde_json::Value;
use tokio::io::AsyncRead;
use crate::{Error, Result};

/// Content type used for every upload
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Reader type accepted for streamed uploads
pub type PayloadReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Upload body; the length is always known up front since WebHDFS does not
/// accept chunked uploads
pub enum Payload {
    /// Fully buffered body
    InMemory(Bytes),
    /// Body read from `reader`, exactly `length` bytes
    Streamed { reader: PayloadReader, length: u64 },
}

impl Payload {
    pub fn streamed(reader: impl AsyncRead + Send + Sync + Unpin + 'static, length: u64) -> Self {
        Payload::Streamed {
            reader: Box::new(reader),
            length,
        }
    }

    pub fn len(&self) -> u64 {
        match self {
            Payload::InMemory(bytes) => bytes.len() as u64,
            Payload::Streamed { length, .. } => *length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// In-memory payloads can be sent again on retry
    pub fn is_replayable(&self) -> bool {
        matches!(self, Payload::InMemory(_))
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::InMemory(bytes) => f.debug_tuple("InMemory").field(&bytes.len()).finish(),
            Payload::Streamed { length, .. } => {
                f.debug_struct("Streamed").field("length", length).finish_non_exhaustive()
            }
        }
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::InMemory(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::InMemory(Bytes::from(bytes))
    }
}

impl From<&'static str> for Payload {
    fn from(text: &'static str) -> Self {
        Payload::InMemory(Bytes::from_static(text.as_bytes()))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::InMemory(Bytes::from(text))
    }
}

/// Hands out the payload once per attempt. In-memory bodies are cloned for
/// every attempt; a streamed body is handed out once.
#[derive(Debug, Default)]
pub(crate) struct PayloadSlot {
    payload: Option<Payload>,
}

impl PayloadSlot {
    pub(crate) fn new(payload: Option<Payload>) -> Self {
        Self { payload }
    }

    pub(crate) fn is_some(&self) -> bool {
        self.payload.is_some()
    }

    /// Whether another attempt can carry the same body
    pub(crate) fn can_replay(&self, had_payload: bool) -> bool {
        !had_payload || self.payload.as_ref().is_some_and(Payload::is_replayable)
    }

    pub(crate) fn for_attempt(&mut self) -> Option<Payload> {
        match &self.payload {
            Some(Payload::InMemory(bytes)) => Some(Payload::InMemory(bytes.clone())),
            Some(Payload::Streamed { .. }) => self.payload.take(),
            None => None,
        }
    }
}

/// Successful response of an operation
#[derive(Debug, Clone)]
pub struct OperationResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OperationResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Whether the response declares `application/json`, parameters ignored
    pub fn is_json(&self) -> bool {
        self.content_type()
            .and_then(|value| value.split(';').next())
            .is_some_and(|media| media.trim().eq_ignore_ascii_case("application/json"))
    }

    /// Parse the body as JSON
    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Extract one top-level attribute of a JSON body
    pub fn json_attribute(&self, name: &str) -> Result<Value> {
        let mut json = self.json()?;
        json.get_mut(name).map(Value::take).ok_or_else(|| {
            Error::protocol(
                format!("response has no \"{}\" attribute", name),
                Some(self.status),
            )
        })
    }

    /// Value of `{"boolean": true|false}`
    pub fn boolean(&self) -> Result<bool> {
        self.json_attribute("boolean")?.as_bool().ok_or_else(|| {
            Error::protocol("\"boolean\" attribute is not a boolean", Some(self.status))
        })
    }
}
