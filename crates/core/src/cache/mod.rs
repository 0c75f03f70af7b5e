//! Versioned response store.
//!
//! A store holds any number of named generations; each generation maps a
//! [`RequestKey`] to one [`Response`]. The agent only talks to the [`Store`]
//! trait. Two implementations ship with the crate:
//!
//! - [`CacheDb`]: SQLite via tokio-rusqlite, WAL mode, versioned migrations
//! - [`MemoryStore`]: `RwLock<HashMap>` for tests and ephemeral hosts

pub mod connection;
pub mod entries;
pub mod memory;
pub mod migrations;

use async_trait::async_trait;

pub use crate::Error;
use crate::{RequestKey, Response};

pub use connection::CacheDb;
pub use memory::MemoryStore;

/// Storage capability the agent depends on.
///
/// Every method is atomic at key or generation granularity; callers never
/// need to hold a lock across calls.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create the generation if it does not exist yet.
    async fn open(&self, generation: &str) -> Result<(), Error>;

    /// Look up one entry. A miss is `Ok(None)`, never an error.
    async fn get(&self, generation: &str, key: &RequestKey) -> Result<Option<Response>, Error>;

    /// Insert or overwrite one entry, creating the generation if needed.
    async fn put(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<(), Error>;

    /// Drop a generation and all its entries. Returns whether it existed.
    async fn delete(&self, generation: &str) -> Result<bool, Error>;

    /// Names of all existing generations, oldest first.
    async fn generations(&self) -> Result<Vec<String>, Error>;

    /// Keys stored in a generation, sorted by method then URL.
    async fn keys(&self, generation: &str) -> Result<Vec<RequestKey>, Error>;
}
