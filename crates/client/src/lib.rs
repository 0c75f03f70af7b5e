//! Client code for the nixer offline agent.
//!
//! Provides the live [`Network`](nixer_core::Network) implementation used by
//! the host binary.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig};
