//! Responses, live or stored.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// An HTTP response snapshot.
///
/// The body is reference-counted, so a clone handed to the store and the
/// original handed back to the caller can each be read in full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub url: Url,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(url: Url, status: u16, body: impl Into<Bytes>) -> Self {
        Self { url, status, headers: Vec::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub(crate) fn headers_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&HeaderList(self.headers.clone()))
    }

    pub(crate) fn headers_from_json(json: &str) -> Result<Vec<(String, String)>, serde_json::Error> {
        serde_json::from_str::<HeaderList>(json).map(|h| h.0)
    }
}

#[derive(Serialize, Deserialize)]
struct HeaderList(Vec<(String, String)>);
