//! services/api/src/web/debounce.rs
//!
//! A trailing-edge debouncer for the analysis pipeline. Each call schedules
//! the work after a quiet period and cancels whatever was pending, so a burst
//! of edits runs the work exactly once, with the newest state.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Schedules at most one pending execution at a time.
///
/// The timer is an explicit `CancellationToken` rather than a detached sleep,
/// so `cancel` can drop a pending run synchronously during teardown.
pub struct Debouncer {
    wait: Duration,
    pending: Option<CancellationToken>,
}

impl Debouncer {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            pending: None,
        }
    }

    /// Schedules `work` to run after the quiet period. A previous pending
    /// run, if any, is cancelled first; only the newest call survives.
    pub fn call<F, Fut>(&mut self, work: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        self.cancel();

        let token = CancellationToken::new();
        self.pending = Some(token.clone());
        let wait = self.wait;

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(wait) => {
                    work().await;
                }
            }
        });
    }

    /// Drops the pending run without executing it.
    pub fn cancel(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
