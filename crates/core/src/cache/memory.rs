//! In-memory store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::Store;
use crate::{Error, RequestKey, Response};

#[derive(Default)]
struct Generations {
    order: Vec<String>,
    entries: HashMap<String, BTreeMap<RequestKey, Response>>,
}

impl Generations {
    fn open(&mut self, generation: &str) -> &mut BTreeMap<RequestKey, Response> {
        if !self.entries.contains_key(generation) {
            self.order.push(generation.to_string());
        }
        self.entries.entry(generation.to_string()).or_default()
    }
}

/// Store backed by a `HashMap` behind a tokio `RwLock`.
///
/// Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Generations>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries across every generation.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn open(&self, generation: &str) -> Result<(), Error> {
        self.inner.write().await.open(generation);
        Ok(())
    }

    async fn get(&self, generation: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        let inner = self.inner.read().await;
        Ok(inner.entries.get(generation).and_then(|g| g.get(key)).cloned())
    }

    async fn put(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        inner.open(generation).insert(key.clone(), response.clone());
        Ok(())
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        let mut inner = self.inner.write().await;
        inner.order.retain(|name| name != generation);
        Ok(inner.entries.remove(generation).is_some())
    }

    async fn generations(&self) -> Result<Vec<String>, Error> {
        Ok(self.inner.read().await.order.clone())
    }

    async fn keys(&self, generation: &str) -> Result<Vec<RequestKey>, Error> {
        let inner = self.inner.read().await;
        Ok(inner
            .entries
            .get(generation)
            .map(|g| g.keys().cloned().collect())
            .unwrap_or_default())
    }
}
