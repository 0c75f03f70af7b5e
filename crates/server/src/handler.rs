//! Event dispatch for the stdio host.
//!
//! Lifecycle events are handled in arrival order, each finishing before the
//! next line is read. Fetch events are spawned onto a `JoinSet` and may
//! complete in any order; every reply goes through one writer task.

use std::sync::Arc;

use anyhow::Result;
use nixer_core::{Agent, InterceptedRequest};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::clients::ClientRegistry;
use crate::error::HostError;
use crate::protocol::{Envelope, Event, Outcome, Reply};

/// Reply channel depth; fetch tasks block once the writer falls this far behind.
const REPLY_BUFFER: usize = 64;

/// The hosting runtime around one agent.
#[derive(Clone)]
pub struct Host {
    agent: Arc<Agent>,
    clients: Arc<ClientRegistry>,
}

impl Host {
    pub fn new(agent: Arc<Agent>, clients: Arc<ClientRegistry>) -> Self {
        Self { agent, clients }
    }

    pub fn parse(line: &str) -> Result<Envelope, HostError> {
        Ok(serde_json::from_str(line)?)
    }

    /// Handle one event and build its reply.
    pub async fn dispatch(&self, envelope: Envelope) -> Reply {
        let outcome = self.handle(envelope.event).await;
        Reply { id: envelope.id, outcome }
    }

    pub async fn handle(&self, event: Event) -> Outcome {
        match event {
            Event::Install => self.agent.install().await.into(),
            Event::Activate { waiting_clients } => self.agent.activate(waiting_clients).await.into(),
            Event::Message { data } => self.agent.message(&data).await.into(),
            Event::Fetch { request } => match InterceptedRequest::try_from(request) {
                Ok(request) => self.agent.fetch(&request).await.into(),
                Err(e) => e.into(),
            },
            Event::Clients { open } => {
                self.clients.set_open(open);
                Outcome::Clients { open }
            }
            Event::Status => Outcome::Status(self.agent.status().await),
        }
    }
}

/// Read events from `input` until EOF, writing one reply line per event to
/// `output`. In-flight fetches are drained before returning.
pub async fn serve<R, W>(host: Host, input: R, output: W) -> Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Reply>(REPLY_BUFFER);

    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(reply) = rx.recv().await {
            let mut line = serde_json::to_vec(&reply)?;
            line.push(b'\n');
            output.write_all(&line).await?;
            output.flush().await?;
        }
        anyhow::Ok(output)
    });

    let mut in_flight = JoinSet::new();
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        while let Some(done) = in_flight.try_join_next() {
            if let Err(e) = done {
                tracing::warn!(error = %e, "fetch task aborted");
            }
        }

        let envelope = match Host::parse(&line) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "rejecting malformed event");
                tx.send(Reply { id: None, outcome: e.into() }).await?;
                continue;
            }
        };

        if envelope.event.is_concurrent() {
            let host = host.clone();
            let tx = tx.clone();
            in_flight.spawn(async move {
                let reply = host.dispatch(envelope).await;
                if tx.send(reply).await.is_err() {
                    tracing::debug!("reply dropped, writer closed");
                }
            });
        } else {
            tx.send(host.dispatch(envelope).await).await?;
        }
    }

    tracing::info!(in_flight = in_flight.len(), "input closed, draining");
    while let Some(done) = in_flight.join_next().await {
        if let Err(e) = done {
            tracing::warn!(error = %e, "fetch task aborted");
        }
    }
    drop(tx);

    writer.await?
}
