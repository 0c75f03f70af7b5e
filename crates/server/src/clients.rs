//! Client bookkeeping for the stdio host.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use nixer_core::{ClientHost, Error};

/// Tracks the pages the host reports as open and whether the agent has
/// claimed them.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    open: AtomicUsize,
    claimed: AtomicBool,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_open(&self, open: usize) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientHost for ClientRegistry {
    async fn claim(&self) -> Result<usize, Error> {
        self.claimed.store(true, Ordering::SeqCst);
        let open = self.open();
        tracing::debug!(open, "claimed open clients");
        Ok(open)
    }
}
