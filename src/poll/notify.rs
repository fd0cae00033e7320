//! §9's single-slot, edge-triggered wake-up primitive for the long-poll
//! `stream` handler. `tokio::sync::Notify` already has exactly this permit
//! shape (a `notify_one` before anyone is waiting is not lost, and it never
//! accumulates more than one outstanding permit), so this is a thin,
//! named wrapper rather than a hand-rolled condition variable.

use std::sync::Arc;

#[derive(Clone, Default)]
pub struct Waiter(Arc<tokio::sync::Notify>);

impl Waiter {
    pub fn new() -> Self {
        Self(Arc::new(tokio::sync::Notify::new()))
    }

    /// Wakes the waiter exactly once (§8 invariant 7). A spurious extra
    /// `notify_one` with no one waiting is harmless — it just arms the
    /// permit for the next `wait`.
    pub fn wake(&self) {
        self.0.notify_one();
    }

    pub async fn wait(&self) {
        self.0.notified().await;
    }
}
