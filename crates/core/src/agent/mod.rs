//! The cache lifecycle and routing agent.
//!
//! [`Agent`] ties the lifecycle controller, the router and the control
//! channel to injected capabilities: a [`Store`], a [`Network`] and a
//! [`ClientHost`]. Each event handler is independent and may run
//! concurrently with the others.

pub mod control;
pub mod lifecycle;
pub mod router;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use serde_json::Value;
use url::Origin;

pub use control::{Command, MessageOutcome, SKIP_WAITING};
pub use lifecycle::{ActivateOutcome, Activation, InstallReport, Lifecycle, LifecycleState, Phase};
pub use router::{PassReason, RequestClass, RouteContext, Routed, Source};

use crate::config::{AgentConfig, ConfigError};
use crate::network::{ClientHost, Network};
use crate::{Error, InterceptedRequest, RequestKey, Store};

/// Offline-caching agent for a single web application.
pub struct Agent {
    store: Arc<dyn Store>,
    network: Arc<dyn Network>,
    clients: Arc<dyn ClientHost>,
    lifecycle: Lifecycle,
    origin: Origin,
    manifest: Vec<RequestKey>,
    offline_document: RequestKey,
}

impl Agent {
    /// Build an agent from validated configuration.
    pub fn new(
        config: &AgentConfig, store: Arc<dyn Store>, network: Arc<dyn Network>, clients: Arc<dyn ClientHost>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store,
            network,
            clients,
            lifecycle: Lifecycle::new(config.cache_name.clone(), config.skip_waiting_on_install),
            origin: config.scope_url()?.origin(),
            manifest: config.manifest_keys()?,
            offline_document: config.offline_document_key()?,
        })
    }

    pub async fn status(&self) -> LifecycleState {
        self.lifecycle.state().await
    }

    /// Handle the `install` lifecycle event.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let generation = self.lifecycle.begin_install().await?;

        match lifecycle::install(self.store.as_ref(), self.network.as_ref(), &generation, &self.manifest).await {
            Ok(report) => {
                self.lifecycle.finish_install().await;
                tracing::info!(generation = %report.generation, stored = report.stored, "install complete");
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(%generation, error = %e, "install failed");
                Err(e)
            }
        }
    }

    /// Handle the `activate` lifecycle event.
    ///
    /// `waiting_clients` is how many pages an older instance still controls.
    /// Activating an already active instance is a no-op.
    pub async fn activate(&self, waiting_clients: usize) -> Result<ActivateOutcome, Error> {
        if let Some(generation) = self.lifecycle.state().await.active {
            tracing::debug!(%generation, "already active, nothing to do");
            return Ok(ActivateOutcome::AlreadyActive { generation });
        }

        if !self.lifecycle.may_activate(waiting_clients).await? {
            tracing::info!(waiting_clients, "activation waiting for older clients");
            return Ok(ActivateOutcome::Waiting { waiting_clients });
        }

        let generation = self.lifecycle.state().await.generation;
        let activation = lifecycle::activate(self.store.as_ref(), self.clients.as_ref(), &generation).await?;
        self.lifecycle.finish_activate(&generation).await;
        tracing::info!(
            %generation,
            purged = ?activation.purged,
            claimed = activation.claimed,
            "activated"
        );

        Ok(ActivateOutcome::Activated(activation))
    }

    /// Handle a message posted by a page.
    pub async fn message(&self, data: &Value) -> MessageOutcome {
        match Command::parse(data) {
            Some(Command::ForceActivate) if self.lifecycle.grant_skip_waiting().await => {
                tracing::info!("skip-waiting granted by client message");
                MessageOutcome::SkipWaiting
            }
            Some(Command::ForceActivate) => {
                tracing::debug!("skip-waiting message after activation ignored");
                MessageOutcome::Ignored
            }
            None => MessageOutcome::Ignored,
        }
    }

    /// Handle an intercepted request.
    pub async fn fetch(&self, request: &InterceptedRequest) -> Result<Routed, Error> {
        let Some(ctx) = self.lifecycle.route_context(&self.origin, &self.offline_document).await else {
            tracing::debug!(url = %request.url, "no active generation, passing through");
            return Ok(Routed::PassThrough(PassReason::NotControlling));
        };
        router::route(self.store.as_ref(), self.network.as_ref(), &ctx, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{ScriptedNetwork, StaticClients, key, url};
    use super::*;
    use crate::{MemoryStore, Response};
    use serde_json::json;

    struct Harness {
        agent: Agent,
        store: MemoryStore,
        network: Arc<ScriptedNetwork>,
    }

    fn harness(skip_waiting_on_install: bool) -> Harness {
        let config = AgentConfig {
            scope: "https://nixer.app/".into(),
            manifest: vec!["./".into(), "./index.html".into(), "./style.css".into()],
            skip_waiting_on_install,
            ..Default::default()
        };
        let store = MemoryStore::new();
        let network = Arc::new(ScriptedNetwork::new());
        network.serve("/", 200, "root");
        network.serve("/index.html", 200, "index v2");
        network.serve("/style.css", 200, "css v2");
        let agent = Agent::new(&config, Arc::new(store.clone()), network.clone(), Arc::new(StaticClients::new(1)))
            .unwrap();
        Harness { agent, store, network }
    }

    #[tokio::test]
    async fn test_full_lifecycle_replaces_previous_generation() {
        let h = harness(true);
        h.store
            .put("nixer-cache-v1", &key("/style.css"), &Response::new(url("/style.css"), 200, "css v1"))
            .await
            .unwrap();

        h.agent.install().await.unwrap();
        assert_eq!(h.agent.status().await.phase, Phase::Installed);

        let ActivateOutcome::Activated(activation) = h.agent.activate(2).await.unwrap() else {
            panic!("expected activation")
        };
        assert_eq!(activation.purged, vec!["nixer-cache-v1"]);
        assert_eq!(h.store.generations().await.unwrap(), vec!["nixer-cache-v2"]);

        let status = h.agent.status().await;
        assert_eq!(status.phase, Phase::Active);
        assert_eq!(status.active.as_deref(), Some("nixer-cache-v2"));
        assert!(status.clients_claimed);

        let routed = h.agent.fetch(&InterceptedRequest::get(url("/style.css"))).await.unwrap();
        let Routed::Respond { response, source, .. } = routed else { panic!("expected response") };
        assert_eq!(&response.body[..], b"css v2");
        assert_eq!(source, Source::Store);
    }

    #[tokio::test]
    async fn test_fetch_before_activation_passes_through() {
        let h = harness(true);
        h.agent.install().await.unwrap();

        let routed = h.agent.fetch(&InterceptedRequest::get(url("/style.css"))).await.unwrap();
        assert_eq!(routed, Routed::PassThrough(PassReason::NotControlling));
    }

    #[tokio::test]
    async fn test_failed_install_stays_installing() {
        let h = harness(true);
        h.network.fail("/style.css");

        let err = h.agent.install().await.unwrap_err();
        assert!(matches!(err, Error::InstallFetchFailed { .. }));
        assert_eq!(h.agent.status().await.phase, Phase::Installing);
        assert!(matches!(h.agent.activate(0).await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_activate_waits_for_old_clients() {
        let h = harness(false);
        h.agent.install().await.unwrap();

        let outcome = h.agent.activate(1).await.unwrap();
        assert_eq!(outcome, ActivateOutcome::Waiting { waiting_clients: 1 });
        assert_eq!(h.agent.status().await.phase, Phase::Installed);
    }

    #[tokio::test]
    async fn test_skip_waiting_message_forces_activation() {
        let h = harness(false);
        h.agent.install().await.unwrap();

        let outcome = h.agent.message(&json!({"type": "SKIP_WAITING"})).await;
        assert_eq!(outcome, MessageOutcome::SkipWaiting);

        let outcome = h.agent.activate(3).await.unwrap();
        assert!(matches!(outcome, ActivateOutcome::Activated(_)));
    }

    #[tokio::test]
    async fn test_skip_waiting_message_during_install() {
        let h = harness(false);
        assert_eq!(h.agent.message(&json!({"type": "SKIP_WAITING"})).await, MessageOutcome::SkipWaiting);
        assert!(h.agent.status().await.skip_waiting);
    }

    #[tokio::test]
    async fn test_unrecognized_message_ignored() {
        let h = harness(false);
        assert_eq!(h.agent.message(&json!({"type": "PING"})).await, MessageOutcome::Ignored);
        assert!(!h.agent.status().await.skip_waiting);
    }

    #[tokio::test]
    async fn test_skip_waiting_after_activation_ignored() {
        let h = harness(true);
        h.agent.install().await.unwrap();
        h.agent.activate(0).await.unwrap();
        assert_eq!(h.agent.message(&json!({"type": "SKIP_WAITING"})).await, MessageOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_second_activate_is_a_no_op() {
        let h = harness(true);
        h.agent.install().await.unwrap();
        h.agent.activate(0).await.unwrap();

        h.store
            .put("nixer-cache-v1", &key("/style.css"), &Response::new(url("/style.css"), 200, "css v1"))
            .await
            .unwrap();

        let outcome = h.agent.activate(0).await.unwrap();
        assert_eq!(outcome, ActivateOutcome::AlreadyActive { generation: "nixer-cache-v2".into() });
        assert_eq!(h.store.generations().await.unwrap(), vec!["nixer-cache-v2", "nixer-cache-v1"]);
        assert_eq!(h.agent.status().await.phase, Phase::Active);
    }

    #[tokio::test]
    async fn test_offline_navigation_uses_installed_index() {
        let h = harness(true);
        h.agent.install().await.unwrap();
        h.agent.activate(0).await.unwrap();
        h.network.fail("/index.html");

        let routed = h.agent.fetch(&InterceptedRequest::navigate(url("/notes/7"))).await.unwrap();
        let Routed::Respond { response, source, .. } = routed else { panic!("expected response") };
        assert_eq!(&response.body[..], b"index v2");
        assert_eq!(source, Source::Fallback);
    }
}
