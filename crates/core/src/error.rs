//! Unified error types for the offline agent.
//!
//! Every variant renders with a stable `CODE:` prefix; the host protocol
//! reports the same code through [`Error::code`].

use tokio_rusqlite::rusqlite;

/// Unified error type for store, network and lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed input from the host (bad event, bad request fields).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// URL could not be parsed or resolved.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// A manifest asset could not be fetched while installing a generation.
    #[error("INSTALL_FETCH_FAILED: {url}: {reason}")]
    InstallFetchFailed { url: String, reason: String },

    /// Transport-level fetch failure (offline, DNS, connection reset, timeout).
    #[error("NETWORK_UNAVAILABLE: {0}")]
    NetworkUnavailable(String),

    /// Response body exceeded the configured limit.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Network-first request failed and neither the request nor the root
    /// document is stored.
    #[error("OFFLINE_FALLBACK_MISSING: {0}")]
    OfflineFallbackMissing(String),

    /// Lifecycle operation requested from a phase that does not allow it.
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::InstallFetchFailed { .. } => "INSTALL_FETCH_FAILED",
            Error::NetworkUnavailable(_) => "NETWORK_UNAVAILABLE",
            Error::FetchTooLarge(_) => "FETCH_TOO_LARGE",
            Error::OfflineFallbackMissing(_) => "OFFLINE_FALLBACK_MISSING",
            Error::InvalidState(_) => "INVALID_STATE",
            Error::Database(_) | Error::MigrationFailed(_) => "STORE_ERROR",
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidInput(err.to_string())
    }
}
