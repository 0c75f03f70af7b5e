//! Capability fakes shared by the agent tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use url::Url;

use crate::network::{ClientHost, Network};
use crate::{Error, InterceptedRequest, MemoryStore, RequestKey, Response, Store};

pub fn url(path: &str) -> Url {
    Url::parse("https://nixer.app/").unwrap().join(path).unwrap()
}

pub fn key(path: &str) -> RequestKey {
    RequestKey::get(url(path))
}

enum Script {
    Serve(u16, String),
    Fail,
}

/// Network that answers from a script and records every fetched URL.
/// Unscripted URLs fail as if offline.
#[derive(Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<Url, Script>>,
    calls: Mutex<Vec<Url>>,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offline() -> Self {
        Self::default()
    }

    pub fn serve(&self, path: &str, status: u16, body: &str) {
        self.routes.lock().unwrap().insert(url(path), Script::Serve(status, body.to_string()));
    }

    pub fn fail(&self, path: &str) {
        self.routes.lock().unwrap().insert(url(path), Script::Fail);
    }

    pub fn calls(&self) -> Vec<Url> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<Response, Error> {
        self.calls.lock().unwrap().push(request.url.clone());
        match self.routes.lock().unwrap().get(&request.url) {
            Some(Script::Serve(status, body)) => Ok(Response::new(request.url.clone(), *status, body.clone())),
            Some(Script::Fail) | None => Err(Error::NetworkUnavailable(format!("offline: {}", request.url))),
        }
    }
}

/// Client host with a fixed number of open clients.
pub struct StaticClients {
    count: usize,
    observe: Option<MemoryStore>,
    seen: tokio::sync::Mutex<Option<Vec<String>>>,
}

impl StaticClients {
    pub fn new(count: usize) -> Self {
        Self { count, observe: None, seen: tokio::sync::Mutex::new(None) }
    }

    /// Records which generations exist at the moment `claim` runs.
    pub fn observing(store: MemoryStore) -> Self {
        Self { count: 1, observe: Some(store), seen: tokio::sync::Mutex::new(None) }
    }

    pub async fn generations_seen_at_claim(&self) -> Option<Vec<String>> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl ClientHost for StaticClients {
    async fn claim(&self) -> Result<usize, Error> {
        if let Some(store) = &self.observe {
            *self.seen.lock().await = Some(store.generations().await?);
        }
        Ok(self.count)
    }
}

/// Store whose every call fails, counting how often it was touched.
#[derive(Default)]
pub struct FailingStore {
    touched: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touched(&self) -> usize {
        self.touched.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T, Error> {
        self.touched.fetch_add(1, Ordering::SeqCst);
        Err(Error::Database(tokio_rusqlite::Error::ConnectionClosed))
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn open(&self, _generation: &str) -> Result<(), Error> {
        self.fail()
    }

    async fn get(&self, _generation: &str, _key: &RequestKey) -> Result<Option<Response>, Error> {
        self.fail()
    }

    async fn put(&self, _generation: &str, _key: &RequestKey, _response: &Response) -> Result<(), Error> {
        self.fail()
    }

    async fn delete(&self, _generation: &str) -> Result<bool, Error> {
        self.fail()
    }

    async fn generations(&self) -> Result<Vec<String>, Error> {
        self.fail()
    }

    async fn keys(&self, _generation: &str) -> Result<Vec<RequestKey>, Error> {
        self.fail()
    }
}

/// Memory store that rejects every `put` after the first `limit`.
pub struct WriteLimitedStore {
    inner: MemoryStore,
    remaining: AtomicUsize,
}

impl WriteLimitedStore {
    pub fn new(inner: MemoryStore, limit: usize) -> Self {
        Self { inner, remaining: AtomicUsize::new(limit) }
    }
}

#[async_trait]
impl Store for WriteLimitedStore {
    async fn open(&self, generation: &str) -> Result<(), Error> {
        self.inner.open(generation).await
    }

    async fn get(&self, generation: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        self.inner.get(generation, key).await
    }

    async fn put(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        let allowed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(Error::Database(tokio_rusqlite::Error::ConnectionClosed));
        }
        self.inner.put(generation, key, response).await
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        self.inner.delete(generation).await
    }

    async fn generations(&self) -> Result<Vec<String>, Error> {
        self.inner.generations().await
    }

    async fn keys(&self, generation: &str) -> Result<Vec<RequestKey>, Error> {
        self.inner.keys(generation).await
    }
}
