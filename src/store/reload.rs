//! Exclusion guard for background reloads.
//!
//! At most one reload runs at a time. A request that arrives while one is
//! running is folded into a single follow-up round, so a burst of requests
//! costs at most two fetches.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

#[derive(Debug)]
pub struct ReloadGuard {
    busy: watch::Sender<bool>,
    pending: AtomicBool,
}

impl Default for ReloadGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadGuard {
    pub fn new() -> Self {
        let (busy, _) = watch::channel(false);
        Self {
            busy,
            pending: AtomicBool::new(false),
        }
    }

    /// Claim the guard. Returns false when a reload is already running; the
    /// request is then remembered and served by that reload's follow-up round.
    pub fn try_begin(&self) -> bool {
        let mut acquired = false;
        // The closure runs under the channel's write lock, which also
        // serializes it against `finish`.
        self.busy.send_if_modified(|busy| {
            if *busy {
                self.pending.store(true, Ordering::SeqCst);
                false
            } else {
                *busy = true;
                acquired = true;
                true
            }
        });
        acquired
    }

    /// Called by the holder after each round. Returns true when another round
    /// was requested meanwhile; the guard then stays held.
    pub fn finish(&self) -> bool {
        let mut rerun = false;
        self.busy.send_if_modified(|busy| {
            if self.pending.swap(false, Ordering::SeqCst) {
                rerun = true;
                false
            } else {
                *busy = false;
                true
            }
        });
        rerun
    }

    pub fn is_busy(&self) -> bool {
        *self.busy.borrow()
    }

    /// Resolve once no reload is running.
    pub async fn idle(&self) {
        let mut rx = self.busy.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|busy| !*busy).await.map(|_| ());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn second_request_is_coalesced() {
        let guard = ReloadGuard::new();
        assert!(guard.try_begin());
        assert!(!guard.try_begin());
        assert!(!guard.try_begin());
        assert!(guard.is_busy());

        // Two extra requests collapse into one follow-up round.
        assert!(guard.finish());
        assert!(guard.is_busy());
        assert!(!guard.finish());
        assert!(!guard.is_busy());
    }

    #[test]
    fn guard_is_reusable_after_release() {
        let guard = ReloadGuard::new();
        assert!(guard.try_begin());
        assert!(!guard.finish());
        assert!(guard.try_begin());
    }

    #[tokio::test]
    async fn idle_resolves_immediately_when_free() {
        let guard = ReloadGuard::new();
        tokio::time::timeout(Duration::from_millis(100), guard.idle())
            .await
            .expect("idle guard should resolve");
    }

    #[tokio::test]
    async fn idle_waits_for_release() {
        let guard = Arc::new(ReloadGuard::new());
        assert!(guard.try_begin());

        let waiter = {
            let guard = guard.clone();
            tokio::spawn(async move { guard.idle().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        assert!(!guard.finish());
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
    }
}
