//! JSON-lines wire protocol between the hosting runtime and the agent.
//!
//! One event per input line, one reply per output line. Replies echo the
//! event `id` so concurrently handled fetches can be matched up.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use nixer_core::agent::{
    ActivateOutcome, InstallReport, LifecycleState, MessageOutcome, PassReason, RequestClass, Routed, Source,
};
use nixer_core::{Error, InterceptedRequest, RequestMode};

/// An event line.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub event: Event,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Install,
    Activate {
        /// Clients still controlled by an older instance.
        #[serde(default)]
        waiting_clients: usize,
    },
    Message {
        #[serde(default)]
        data: Value,
    },
    Fetch {
        request: WireRequest,
    },
    /// Host reports how many pages are open in scope.
    Clients {
        open: usize,
    },
    Status,
}

impl Event {
    /// Fetches may run concurrently; lifecycle events run in arrival order.
    pub fn is_concurrent(&self) -> bool {
        matches!(self, Event::Fetch { .. })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireRequest {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub mode: RequestMode,
    #[serde(default)]
    pub accept: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

impl TryFrom<WireRequest> for InterceptedRequest {
    type Error = Error;

    fn try_from(wire: WireRequest) -> Result<Self, Self::Error> {
        InterceptedRequest::new(&wire.method, &wire.url, wire.mode, wire.accept)
    }
}

/// A reply line.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Installed {
        generation: String,
        stored: usize,
    },
    Activated {
        generation: String,
        purged: Vec<String>,
        claimed: usize,
    },
    Waiting {
        waiting_clients: usize,
    },
    AlreadyActive {
        generation: String,
    },
    SkipWaiting,
    Ignored,
    Respond {
        class: RequestClass,
        source: Source,
        url: String,
        status: u16,
        headers: Vec<(String, String)>,
        /// UTF-8 body text; absent for binary bodies.
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        body_len: usize,
    },
    PassThrough {
        reason: PassReason,
    },
    Clients {
        open: usize,
    },
    Status(LifecycleState),
    Failed {
        code: String,
        message: String,
    },
}

impl From<InstallReport> for Outcome {
    fn from(report: InstallReport) -> Self {
        Outcome::Installed { generation: report.generation, stored: report.stored }
    }
}

impl From<ActivateOutcome> for Outcome {
    fn from(outcome: ActivateOutcome) -> Self {
        match outcome {
            ActivateOutcome::Activated(a) => {
                Outcome::Activated { generation: a.generation, purged: a.purged, claimed: a.claimed }
            }
            ActivateOutcome::Waiting { waiting_clients } => Outcome::Waiting { waiting_clients },
            ActivateOutcome::AlreadyActive { generation } => Outcome::AlreadyActive { generation },
        }
    }
}

impl From<MessageOutcome> for Outcome {
    fn from(outcome: MessageOutcome) -> Self {
        match outcome {
            MessageOutcome::SkipWaiting => Outcome::SkipWaiting,
            MessageOutcome::Ignored => Outcome::Ignored,
        }
    }
}

impl From<Routed> for Outcome {
    fn from(routed: Routed) -> Self {
        match routed {
            Routed::Respond { response, class, source } => Outcome::Respond {
                class,
                source,
                url: response.url.to_string(),
                status: response.status,
                body: std::str::from_utf8(&response.body).ok().map(str::to_string),
                body_len: response.body.len(),
                headers: response.headers,
            },
            Routed::PassThrough(reason) => Outcome::PassThrough { reason },
        }
    }
}

impl From<Error> for Outcome {
    fn from(err: Error) -> Self {
        Outcome::Failed { code: err.code().to_string(), message: err.to_string() }
    }
}

impl<T: Into<Outcome>> From<Result<T, Error>> for Outcome {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(err) => err.into(),
        }
    }
}
