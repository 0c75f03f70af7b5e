//! Agent configuration with layered loading.
//!
//! Configuration is loaded with figment from multiple sources:
//!
//! 1. Environment variables (NIXER_SW_*)
//! 2. TOML config file (if NIXER_SW_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::RequestKey;
use crate::canonical::resolve;

mod validation;

pub use validation::ConfigError;

/// Assets pre-populated into every new generation.
pub const DEFAULT_MANIFEST: &[&str] = &[
    "./",
    "./index.html",
    "./style.css",
    "./manifest.json",
    "./icons/icons-192.png",
    "./icons/icons-512.png",
];

/// Agent configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (NIXER_SW_*)
/// 2. TOML config file (if NIXER_SW_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Generation tag of this release. Bump it to invalidate old caches.
    ///
    /// Set via NIXER_SW_CACHE_NAME environment variable.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Base URL the agent is registered under; its origin is the agent's own
    /// origin and manifest paths resolve against it.
    ///
    /// Set via NIXER_SW_SCOPE environment variable.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Paths fetched and stored during install, in order.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Root document served when a document request fails offline and has
    /// no stored copy of its own.
    #[serde(default = "default_offline_document")]
    pub offline_document: String,

    /// Grant skip-waiting as soon as install starts.
    ///
    /// Set via NIXER_SW_SKIP_WAITING_ON_INSTALL environment variable.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,

    /// Path to SQLite store database. `:memory:` keeps everything in memory.
    ///
    /// Set via NIXER_SW_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum response body size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_cache_name() -> String {
    "nixer-cache-v2".into()
}

fn default_scope() -> String {
    "http://localhost:8080/".into()
}

fn default_manifest() -> Vec<String> {
    DEFAULT_MANIFEST.iter().map(|p| String::from(*p)).collect()
}

fn default_offline_document() -> String {
    "./index.html".into()
}

fn default_true() -> bool {
    true
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./nixer-sw-cache.sqlite")
}

fn default_user_agent() -> String {
    "nixer-sw/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            cache_name: default_cache_name(),
            scope: default_scope(),
            manifest: default_manifest(),
            offline_document: default_offline_document(),
            skip_waiting_on_install: true,
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl AgentConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether the store should live in memory only.
    pub fn in_memory(&self) -> bool {
        self.db_path.as_os_str() == ":memory:"
    }

    /// Parsed scope URL.
    pub fn scope_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.scope).map_err(|e| ConfigError::Invalid {
            field: "scope".into(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::Invalid { field: "scope".into(), reason: format!("unsupported scheme {other}") }),
        }
    }

    /// Manifest entries resolved to store identities, in manifest order.
    pub fn manifest_keys(&self) -> Result<Vec<RequestKey>, ConfigError> {
        let scope = self.scope_url()?;
        self.manifest
            .iter()
            .map(|path| {
                resolve(&scope, path)
                    .map(RequestKey::get)
                    .map_err(|e| ConfigError::Invalid { field: "manifest".into(), reason: format!("{path}: {e}") })
            })
            .collect()
    }

    /// Identity of the root document used as the offline fallback.
    pub fn offline_document_key(&self) -> Result<RequestKey, ConfigError> {
        let scope = self.scope_url()?;
        resolve(&scope, &self.offline_document)
            .map(RequestKey::get)
            .map_err(|e| ConfigError::Invalid { field: "offline_document".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("NIXER_SW_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("NIXER_SW_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
