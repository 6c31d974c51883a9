//! Background execution port (driven/secondary port)
//!
//! When the application leaves the foreground mid-sync, the engine asks
//! the host for a finite background-execution grant so the in-flight
//! batch can finish. The host signals expiration; the engine pauses both
//! watchers and lets the currently-running task complete.

use tokio::sync::oneshot;

/// A finite background-execution grant issued by the host.
///
/// Dropping the grant tells the host the background work ended early.
pub struct BackgroundGrant {
    expiration: oneshot::Receiver<()>,
    end: Option<Box<dyn FnOnce() + Send>>,
}

impl BackgroundGrant {
    /// Creates a grant from the host's expiration signal and an
    /// end-of-work callback invoked exactly once on drop.
    pub fn new(expiration: oneshot::Receiver<()>, end: impl FnOnce() + Send + 'static) -> Self {
        Self {
            expiration,
            end: Some(Box::new(end)),
        }
    }

    /// Resolves when the host expires the grant (or abandons it).
    pub async fn expired(mut self) {
        let _ = (&mut self.expiration).await;
    }
}

impl Drop for BackgroundGrant {
    fn drop(&mut self) {
        if let Some(end) = self.end.take() {
            end();
        }
    }
}

impl std::fmt::Debug for BackgroundGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundGrant")
            .field("active", &self.end.is_some())
            .finish()
    }
}

/// Port trait for requesting background-execution grants from the host.
pub trait BackgroundActivity: Send + Sync {
    /// Begins a named grant. The returned grant's expiration resolves
    /// when the host runs out of background time.
    fn begin(&self, name: &str) -> BackgroundGrant;
}

/// Host adapter for platforms without finite background execution: the
/// grant never expires and ending it is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnlimitedActivity;

impl BackgroundActivity for UnlimitedActivity {
    fn begin(&self, _name: &str) -> BackgroundGrant {
        let (tx, rx) = oneshot::channel();
        // The sender lives inside the end callback, so the expiration
        // channel stays open for the grant's whole lifetime.
        BackgroundGrant::new(rx, move || drop(tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unlimited_grant_never_expires() {
        let grant = UnlimitedActivity.begin("sync");
        let expired = tokio::time::timeout(Duration::from_millis(50), grant.expired()).await;
        assert!(expired.is_err(), "unlimited grant must not expire");
    }

    #[tokio::test]
    async fn test_grant_expires_when_host_signals() {
        let (tx, rx) = oneshot::channel();
        let grant = BackgroundGrant::new(rx, || {});
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_millis(50), grant.expired())
            .await
            .expect("grant should expire once signaled");
    }

    #[tokio::test]
    async fn test_drop_runs_end_callback_once() {
        let ended = Arc::new(AtomicBool::new(false));
        let flag = ended.clone();
        let (_tx, rx) = oneshot::channel();
        let grant = BackgroundGrant::new(rx, move || flag.store(true, Ordering::SeqCst));
        drop(grant);
        assert!(ended.load(Ordering::SeqCst));
    }
}
