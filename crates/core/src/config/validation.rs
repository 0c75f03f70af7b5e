//! Configuration validation rules.
//!
//! Checks `AgentConfig` values after they have been loaded from
//! environment, files, or defaults.

use std::collections::HashSet;

use crate::config::AgentConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AgentConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_name` or `user_agent` is empty
    /// - `scope` is not an absolute http(s) URL
    /// - `manifest` is empty, has an unresolvable entry, or resolves two
    ///   entries to the same URL
    /// - `offline_document` does not resolve to the scope's origin
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_name.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "cache_name".into(), reason: "must not be empty".into() });
        }

        let scope = self.scope_url()?;

        if self.manifest.is_empty() {
            return Err(ConfigError::Invalid { field: "manifest".into(), reason: "must list at least one asset".into() });
        }
        let keys = self.manifest_keys()?;
        let mut seen = HashSet::new();
        for key in &keys {
            if !seen.insert(key.url.as_str()) {
                return Err(ConfigError::Invalid {
                    field: "manifest".into(),
                    reason: format!("duplicate entry {}", key.url),
                });
            }
            if key.url.origin() != scope.origin() {
                return Err(ConfigError::Invalid {
                    field: "manifest".into(),
                    reason: format!("{} is not same-origin with the scope", key.url),
                });
            }
        }

        let offline = self.offline_document_key()?;
        if offline.url.origin() != scope.origin() {
            return Err(ConfigError::Invalid {
                field: "offline_document".into(),
                reason: "must be same-origin with the scope".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if !seen.contains(offline.url.as_str()) {
            tracing::warn!(
                offline_document = %offline.url,
                "offline_document is not in the manifest; offline navigation falls back only after it is visited once"
            );
        }

        Ok(())
    }
}
