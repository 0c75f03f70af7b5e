//! Core of the nixer offline agent.
//!
//! This crate provides:
//! - The cache lifecycle and routing [`Agent`]
//! - The versioned [`Store`] trait with SQLite and in-memory backends
//! - Request/response types and URL canonicalization
//! - Unified error types
//! - Configuration structures

pub mod agent;
pub mod cache;
pub mod canonical;
pub mod config;
pub mod error;
pub mod network;
pub mod request;
pub mod response;

pub use agent::Agent;
pub use cache::{CacheDb, MemoryStore, Store};
pub use config::AgentConfig;
pub use error::Error;
pub use network::{ClientHost, Network};
pub use request::{InterceptedRequest, RequestKey, RequestMode};
pub use response::Response;
