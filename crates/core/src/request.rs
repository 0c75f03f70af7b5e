//! Intercepted requests and their store identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::Error;
use crate::canonical::canonicalize;

/// Request mode as reported by the hosting runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level page navigation.
    Navigate,
    SameOrigin,
    #[default]
    NoCors,
    Cors,
}

/// A request handed to the agent by the hosting runtime.
///
/// Transient: it is classified and possibly answered, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
    pub accept: Option<String>,
}

impl InterceptedRequest {
    /// Build a request from raw host fields, canonicalizing the URL.
    pub fn new(method: &str, url: &str, mode: RequestMode, accept: Option<String>) -> Result<Self, Error> {
        let url = canonicalize(url)?;
        let method = method.trim().to_ascii_uppercase();
        if method.is_empty() {
            return Err(Error::InvalidInput("method cannot be empty".into()));
        }
        Ok(Self { method, url, mode, accept })
    }

    /// Plain GET with no accept header, the shape of a subresource load.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".into(), url, mode: RequestMode::NoCors, accept: None }
    }

    /// Top-level navigation to `url`.
    pub fn navigate(url: Url) -> Self {
        Self { method: "GET".into(), url, mode: RequestMode::Navigate, accept: Some("text/html".into()) }
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Store identity for this request.
    pub fn key(&self) -> RequestKey {
        RequestKey { method: self.method.clone(), url: self.url.clone() }
    }
}

/// Identity of a stored response: method plus absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: Url,
}

impl RequestKey {
    pub fn get(url: Url) -> Self {
        Self { method: "GET".into(), url }
    }

    /// Content-addressed row key used by the SQLite store.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.url.as_str().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}
