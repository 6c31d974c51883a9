//! Durable sync state port (driven/secondary port)

/// Port trait for the single durable flag gating initial-sync semantics.
///
/// Read once at engine start to seed the Reconciler; written when the
/// first-ever reconciliation completes. Survives process restarts.
pub trait SyncStateStore: Send + Sync {
    /// True when a full sync has completed at least once in the lifetime
    /// of this installation.
    fn did_finish_initial_sync(&self) -> bool;

    /// Records completion (or, for diagnostics, clears it).
    fn set_did_finish_initial_sync(&self, done: bool) -> anyhow::Result<()>;
}
