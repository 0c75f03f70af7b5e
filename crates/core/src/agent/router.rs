//! Per-request routing.
//!
//! Same-origin GET requests are intercepted and split in two classes:
//!
//! - document-like (navigation, `text/html` accept, `.html` path):
//!   network-first, falling back to the stored copy and then to the root
//!   document
//! - asset-like (everything else): cache-first, network on miss
//!
//! Everything else passes through untouched, with no store access.

use serde::Serialize;
use url::Origin;

use crate::network::Network;
use crate::{Error, InterceptedRequest, RequestKey, Response, Store};

/// Routing inputs taken from the lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteContext {
    pub origin: Origin,
    /// Generation reads and writes go to.
    pub generation: String,
    pub offline_document: RequestKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    Document,
    Asset,
}

/// Why a request was not intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassReason {
    NotGet,
    CrossOrigin,
    /// No generation is active, so this instance controls no clients yet.
    NotControlling,
}

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Network,
    Store,
    /// The root document, served for a document request that failed offline.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    Respond { response: Response, class: RequestClass, source: Source },
    PassThrough(PassReason),
}

/// Interception precondition: GET and same-origin.
pub fn intercept_check(request: &InterceptedRequest, origin: &Origin) -> Result<(), PassReason> {
    if !request.is_get() {
        return Err(PassReason::NotGet);
    }
    if &request.url.origin() != origin {
        return Err(PassReason::CrossOrigin);
    }
    Ok(())
}

pub fn classify(request: &InterceptedRequest) -> RequestClass {
    let navigate = request.mode == crate::RequestMode::Navigate;
    let accepts_html = request.accept.as_deref().is_some_and(|a| a.contains("text/html"));
    let html_path = request.url.path().ends_with(".html");

    if navigate || accepts_html || html_path { RequestClass::Document } else { RequestClass::Asset }
}

/// Route one request. Every branch ends in a response, a pass-through, or an
/// error for the caller.
pub async fn route(
    store: &dyn Store, network: &dyn Network, ctx: &RouteContext, request: &InterceptedRequest,
) -> Result<Routed, Error> {
    if let Err(reason) = intercept_check(request, &ctx.origin) {
        tracing::debug!(url = %request.url, method = %request.method, ?reason, "passing through");
        return Ok(Routed::PassThrough(reason));
    }

    match classify(request) {
        RequestClass::Document => network_first(store, network, ctx, request).await,
        RequestClass::Asset => cache_first(store, network, ctx, request).await,
    }
}

async fn network_first(
    store: &dyn Store, network: &dyn Network, ctx: &RouteContext, request: &InterceptedRequest,
) -> Result<Routed, Error> {
    let key = request.key();

    let err = match network.fetch(request).await {
        Ok(response) => {
            remember(store, &ctx.generation, &key, &response).await;
            return Ok(Routed::Respond { response, class: RequestClass::Document, source: Source::Network });
        }
        Err(err) => err,
    };

    tracing::debug!(url = %request.url, error = %err, "document fetch failed, trying store");

    if let Some(response) = lookup(store, &ctx.generation, &key).await {
        return Ok(Routed::Respond { response, class: RequestClass::Document, source: Source::Store });
    }
    if let Some(response) = lookup(store, &ctx.generation, &ctx.offline_document).await {
        return Ok(Routed::Respond { response, class: RequestClass::Document, source: Source::Fallback });
    }

    Err(Error::OfflineFallbackMissing(format!("{} ({err})", request.url)))
}

async fn cache_first(
    store: &dyn Store, network: &dyn Network, ctx: &RouteContext, request: &InterceptedRequest,
) -> Result<Routed, Error> {
    let key = request.key();

    if let Some(response) = lookup(store, &ctx.generation, &key).await {
        tracing::debug!(url = %request.url, "cache hit");
        return Ok(Routed::Respond { response, class: RequestClass::Asset, source: Source::Store });
    }

    tracing::debug!(url = %request.url, "cache miss");
    let response = network.fetch(request).await?;
    remember(store, &ctx.generation, &key, &response).await;

    Ok(Routed::Respond { response, class: RequestClass::Asset, source: Source::Network })
}

/// Store read where a failing store counts as a miss.
async fn lookup(store: &dyn Store, generation: &str, key: &RequestKey) -> Option<Response> {
    match store.get(generation, key).await {
        Ok(hit) => hit,
        Err(e) => {
            tracing::warn!(%key, error = %e, "store read failed, treating as miss");
            None
        }
    }
}

/// Store a copy of a network response. The caller's response stays valid
/// whether or not the write succeeds.
async fn remember(store: &dyn Store, generation: &str, key: &RequestKey, response: &Response) {
    if let Err(e) = store.put(generation, key, response).await {
        tracing::warn!(%key, error = %e, "failed to store response copy");
    }
}
