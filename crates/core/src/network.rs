//! Network and client-host capabilities.

use async_trait::async_trait;

use crate::{Error, InterceptedRequest, Response};

/// Outgoing network access.
///
/// Any HTTP status is a successful fetch; only transport failures
/// (offline, refused, timed out) are errors, reported as
/// [`Error::NetworkUnavailable`].
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<Response, Error>;
}

/// The hosting runtime's view of connected pages.
#[async_trait]
pub trait ClientHost: Send + Sync {
    /// Take control of every open client. Returns how many were claimed.
    async fn claim(&self) -> Result<usize, Error>;
}
