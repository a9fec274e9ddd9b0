use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Coalescing reload trigger.
///
/// Backed by a single stored permit: any number of `notify` calls made while
/// the scheduler is busy collapse into exactly one pending reload, and the
/// caller never waits.
#[derive(Clone, Default)]
pub struct RestartSignal {
    notify: Arc<Notify>,
    requested: Arc<AtomicU64>,
}

impl RestartSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a reload. Never blocks.
    pub fn notify(&self) {
        self.requested.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();
    }

    /// Wait for the next (coalesced) reload request.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    /// Total number of reload requests ever made.
    pub fn requested(&self) -> u64 {
        self.requested.load(Ordering::Relaxed)
    }
}
