//! Control channel: messages posted to the agent by its pages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire type of the force-activate message.
pub const SKIP_WAITING: &str = "SKIP_WAITING";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Stop waiting for older instances and activate as soon as possible.
    ForceActivate,
}

#[derive(Deserialize)]
struct ControlMessage {
    #[serde(rename = "type")]
    kind: String,
}

impl Command {
    /// Parse a message payload. Anything unrecognized yields `None`.
    pub fn parse(data: &Value) -> Option<Self> {
        let message = ControlMessage::deserialize(data).ok()?;
        match message.kind.as_str() {
            SKIP_WAITING => Some(Command::ForceActivate),
            _ => None,
        }
    }
}

/// What a message did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOutcome {
    SkipWaiting,
    Ignored,
}
