//! Structured errors for the stdio host.

use crate::protocol::Outcome;

/// Errors raised by the host itself rather than the agent.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// A line that is not a valid event.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for HostError {
    fn from(err: serde_json::Error) -> Self {
        HostError::InvalidInput(err.to_string())
    }
}

impl From<HostError> for Outcome {
    fn from(err: HostError) -> Self {
        let (code, message) = match &err {
            HostError::InvalidInput(_) => ("INVALID_INPUT", err.to_string()),
        };

        Outcome::Failed { code: code.to_string(), message }
    }
}
