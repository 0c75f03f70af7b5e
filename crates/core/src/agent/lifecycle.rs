//! Generation lifecycle: install, activate, skip-waiting.
//!
//! `Installing → Installed → Active`, never backward. The free functions do
//! the store and network work; [`Lifecycle`] owns the state record and
//! decides which transitions are allowed.

use futures_util::future::try_join_all;
use serde::Serialize;
use tokio::sync::RwLock;
use url::Origin;

use super::router::RouteContext;
use crate::network::{ClientHost, Network};
use crate::{Error, InterceptedRequest, RequestKey, Response, Store};

/// Lifecycle phase of this agent instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Installing,
    /// Installed and waiting for older instances to release their clients.
    Installed,
    Active,
}

/// Process-wide lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleState {
    pub phase: Phase,
    pub skip_waiting: bool,
    /// Generation this instance installs.
    pub generation: String,
    /// Generation requests are routed against, once activated.
    pub active: Option<String>,
    pub clients_claimed: bool,
}

/// Result of a completed install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub generation: String,
    pub stored: usize,
}

/// Result of a completed activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activation {
    pub generation: String,
    pub purged: Vec<String>,
    pub claimed: usize,
}

/// Outcome of an activate event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivateOutcome {
    Activated(Activation),
    /// Older clients are still attached and skip-waiting was not granted.
    Waiting { waiting_clients: usize },
    /// This instance was already active; nothing was purged or claimed.
    AlreadyActive { generation: String },
}

/// Fetch every manifest entry, then store them all in `generation`.
///
/// All-or-nothing: a transport failure or non-2xx status on any entry fails
/// the install before anything is written.
pub async fn install(
    store: &dyn Store, network: &dyn Network, generation: &str, manifest: &[RequestKey],
) -> Result<InstallReport, Error> {
    let fetched = try_join_all(manifest.iter().map(|key| async move {
        let request = InterceptedRequest::get(key.url.clone());
        let response = network
            .fetch(&request)
            .await
            .map_err(|e| Error::InstallFetchFailed { url: key.url.to_string(), reason: e.to_string() })?;
        if !response.is_ok() {
            return Err(Error::InstallFetchFailed {
                url: key.url.to_string(),
                reason: format!("status {}", response.status),
            });
        }
        Ok((key, response))
    }))
    .await?;

    if let Err(e) = write_generation(store, generation, &fetched).await {
        if let Err(cleanup) = store.delete(generation).await {
            tracing::warn!(%generation, error = %cleanup, "failed to discard partial generation");
        }
        return Err(e);
    }

    Ok(InstallReport { generation: generation.to_string(), stored: fetched.len() })
}

async fn write_generation(
    store: &dyn Store, generation: &str, entries: &[(&RequestKey, Response)],
) -> Result<(), Error> {
    store.open(generation).await?;
    for (key, response) in entries {
        store.put(generation, key, response).await?;
    }
    Ok(())
}

/// Delete every generation except `keep`. Deletions run concurrently and
/// all finish before this returns.
pub async fn purge(store: &dyn Store, keep: &str) -> Result<Vec<String>, Error> {
    let stale: Vec<String> = store
        .generations()
        .await?
        .into_iter()
        .filter(|name| name != keep)
        .collect();

    try_join_all(stale.iter().map(|name| store.delete(name))).await?;

    Ok(stale)
}

/// Purge stale generations, then claim all clients.
pub async fn activate(store: &dyn Store, clients: &dyn ClientHost, generation: &str) -> Result<Activation, Error> {
    let purged = purge(store, generation).await?;
    let claimed = clients.claim().await?;
    Ok(Activation { generation: generation.to_string(), purged, claimed })
}

/// Owner of the lifecycle state record.
pub struct Lifecycle {
    state: RwLock<LifecycleState>,
    skip_waiting_on_install: bool,
}

impl Lifecycle {
    pub fn new(generation: impl Into<String>, skip_waiting_on_install: bool) -> Self {
        Self {
            state: RwLock::new(LifecycleState {
                phase: Phase::Installing,
                skip_waiting: false,
                generation: generation.into(),
                active: None,
                clients_claimed: false,
            }),
            skip_waiting_on_install,
        }
    }

    pub async fn state(&self) -> LifecycleState {
        self.state.read().await.clone()
    }

    /// Snapshot for the router, or `None` while no generation is active.
    pub async fn route_context(&self, origin: &Origin, offline_document: &RequestKey) -> Option<RouteContext> {
        let state = self.state.read().await;
        state.active.as_ref().map(|generation| RouteContext {
            origin: origin.clone(),
            generation: generation.clone(),
            offline_document: offline_document.clone(),
        })
    }

    /// Enter install. Returns the generation to populate.
    pub async fn begin_install(&self) -> Result<String, Error> {
        let mut state = self.state.write().await;
        if state.phase == Phase::Active {
            return Err(Error::InvalidState(format!("{} is already active", state.generation)));
        }
        if self.skip_waiting_on_install && !state.skip_waiting {
            state.skip_waiting = true;
            tracing::info!(generation = %state.generation, "skip-waiting granted on install");
        }
        Ok(state.generation.clone())
    }

    pub async fn finish_install(&self) {
        let mut state = self.state.write().await;
        if state.phase == Phase::Installing {
            state.phase = Phase::Installed;
        }
    }

    /// Grant skip-waiting. Only honoured before activation.
    pub async fn grant_skip_waiting(&self) -> bool {
        let mut state = self.state.write().await;
        match state.phase {
            Phase::Installing | Phase::Installed => {
                state.skip_waiting = true;
                true
            }
            Phase::Active => false,
        }
    }

    /// Whether an activate event may proceed given how many clients older
    /// instances still control.
    pub async fn may_activate(&self, waiting_clients: usize) -> Result<bool, Error> {
        let state = self.state.read().await;
        match state.phase {
            Phase::Installing => {
                Err(Error::InvalidState(format!("{} has not finished installing", state.generation)))
            }
            Phase::Installed => Ok(state.skip_waiting || waiting_clients == 0),
            Phase::Active => Err(Error::InvalidState(format!("{} is already active", state.generation))),
        }
    }

    /// Make `generation` the routing target and mark clients claimed.
    pub async fn finish_activate(&self, generation: &str) {
        let mut state = self.state.write().await;
        state.phase = Phase::Active;
        state.active = Some(generation.to_string());
        state.clients_claimed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::{ScriptedNetwork, StaticClients, WriteLimitedStore, key};
    use crate::{MemoryStore, Response};

    fn manifest() -> Vec<RequestKey> {
        vec![key("/"), key("/index.html"), key("/style.css")]
    }

    fn online(network: &ScriptedNetwork) {
        network.serve("/", 200, "root");
        network.serve("/index.html", 200, "index");
        network.serve("/style.css", 200, "css");
    }

    #[tokio::test]
    async fn test_install_stores_every_manifest_entry() {
        let store = MemoryStore::new();
        let network = ScriptedNetwork::new();
        online(&network);

        let report = install(&store, &network, "v2", &manifest()).await.unwrap();
        assert_eq!(report.stored, 3);

        let mut expected = manifest();
        expected.sort();
        assert_eq!(store.keys("v2").await.unwrap(), expected);
        let css = store.get("v2", &key("/style.css")).await.unwrap().unwrap();
        assert_eq!(&css.body[..], b"css");
    }

    #[tokio::test]
    async fn test_install_twice_is_idempotent() {
        let store = MemoryStore::new();
        let network = ScriptedNetwork::new();
        online(&network);

        install(&store, &network, "v2", &manifest()).await.unwrap();
        let once = store.keys("v2").await.unwrap();
        install(&store, &network, "v2", &manifest()).await.unwrap();

        assert_eq!(store.keys("v2").await.unwrap(), once);
        assert_eq!(store.generations().await.unwrap(), vec!["v2"]);
    }

    #[tokio::test]
    async fn test_install_failure_leaves_no_generation() {
        let store = MemoryStore::new();
        let network = ScriptedNetwork::new();
        network.serve("/", 200, "root");
        network.serve("/index.html", 200, "index");
        network.fail("/style.css");

        let err = install(&store, &network, "v2", &manifest()).await.unwrap_err();
        assert!(matches!(err, Error::InstallFetchFailed { ref url, .. } if url.ends_with("/style.css")));
        assert!(store.generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_rejects_error_status() {
        let store = MemoryStore::new();
        let network = ScriptedNetwork::new();
        online(&network);
        network.serve("/style.css", 404, "missing");

        let err = install(&store, &network, "v2", &manifest()).await.unwrap_err();
        assert!(err.to_string().contains("status 404"));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_install_write_failure_discards_generation() {
        let inner = MemoryStore::new();
        let store = WriteLimitedStore::new(inner.clone(), 2);
        let network = ScriptedNetwork::new();
        online(&network);

        let err = install(&store, &network, "v2", &manifest()).await.unwrap_err();
        assert!(matches!(err, Error::Database(_)));
        assert!(inner.generations().await.unwrap().is_empty());
        assert!(inner.is_empty().await);
    }

    #[tokio::test]
    async fn test_activate_purges_exactly_the_complement() {
        let store = MemoryStore::new();
        for generation in ["a", "b", "c"] {
            store
                .put(generation, &key("/style.css"), &Response::new(key("/style.css").url, 200, generation))
                .await
                .unwrap();
        }
        let clients = StaticClients::new(2);

        let activation = activate(&store, &clients, "b").await.unwrap();

        assert_eq!(activation.purged, vec!["a", "c"]);
        assert_eq!(activation.claimed, 2);
        assert_eq!(store.generations().await.unwrap(), vec!["b"]);
        assert!(store.get("a", &key("/style.css")).await.unwrap().is_none());
        assert!(store.get("c", &key("/style.css")).await.unwrap().is_none());
        assert!(store.get("b", &key("/style.css")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_activate_claims_after_purge() {
        let store = MemoryStore::new();
        store.open("old").await.unwrap();
        store.open("new").await.unwrap();
        let clients = StaticClients::observing(store.clone());

        activate(&store, &clients, "new").await.unwrap();

        assert_eq!(clients.generations_seen_at_claim().await, Some(vec!["new".to_string()]));
    }

    #[tokio::test]
    async fn test_state_machine() {
        let lifecycle = Lifecycle::new("v2", false);
        assert_eq!(lifecycle.state().await.phase, Phase::Installing);
        assert!(matches!(lifecycle.may_activate(0).await, Err(Error::InvalidState(_))));

        lifecycle.begin_install().await.unwrap();
        assert!(!lifecycle.state().await.skip_waiting);
        lifecycle.finish_install().await;
        assert_eq!(lifecycle.state().await.phase, Phase::Installed);

        assert!(!lifecycle.may_activate(1).await.unwrap());
        assert!(lifecycle.may_activate(0).await.unwrap());

        lifecycle.finish_activate("v2").await;
        let state = lifecycle.state().await;
        assert_eq!(state.phase, Phase::Active);
        assert_eq!(state.active.as_deref(), Some("v2"));
        assert!(state.clients_claimed);

        assert!(matches!(lifecycle.begin_install().await, Err(Error::InvalidState(_))));
        assert!(matches!(lifecycle.may_activate(0).await, Err(Error::InvalidState(_))));
        lifecycle.finish_install().await;
        assert_eq!(lifecycle.state().await.phase, Phase::Active);
    }

    #[tokio::test]
    async fn test_skip_waiting_granted_on_install() {
        let lifecycle = Lifecycle::new("v2", true);
        lifecycle.begin_install().await.unwrap();
        lifecycle.finish_install().await;
        assert!(lifecycle.may_activate(3).await.unwrap());
    }

    #[tokio::test]
    async fn test_grant_skip_waiting_only_before_active() {
        let lifecycle = Lifecycle::new("v2", false);
        assert!(lifecycle.grant_skip_waiting().await);

        lifecycle.finish_install().await;
        lifecycle.finish_activate("v2").await;
        assert!(!lifecycle.grant_skip_waiting().await);
    }
}
