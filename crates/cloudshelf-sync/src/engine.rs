//! Synchronization engine
//!
//! The [`SyncEngine`] owns the two watchers, the Reconciler, and one
//! serialized work lane. Watcher callbacks become [`WatcherReport`]s on
//! the lane channel; the lane resolves each event through the Reconciler
//! and executes every returned action in order before touching the next
//! report, so batches from an earlier observation fully drain before a
//! later one begins.
//!
//! ## Flow
//!
//! ```text
//! local watcher ──┐
//!                 ├──→ lane channel ──→ Reconciler ──→ IoWorkers
//! cloud watcher ──┘                         │
//!                                   reload latch ──→ BookmarkLoader
//! ```
//!
//! A fatal error flips the session's cancellation token: remaining lane
//! work short-circuits to no-ops and a supervisor task stops both
//! watchers. Per-item errors are logged and recovered through the next
//! snapshot.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use cloudshelf_core::config::Config;
use cloudshelf_core::domain::{Reconciler, SyncAction, SyncError, WatcherEvent};
use cloudshelf_core::ports::{
    BackgroundActivity, BookmarkLoader, CloudMetadataSource, CloudStore, DirectoryWatcher,
    SyncStateStore, WatcherReport,
};

use crate::cloud_watcher::CloudMetadataWatcher;
use crate::local_watcher::LocalDirectoryWatcher;
use crate::workers::IoWorkers;

/// Capacity of the lane channel; watchers block when the lane falls
/// this far behind.
const REPORT_CHANNEL_CAPACITY: usize = 64;

/// External collaborators the engine is wired to.
pub struct EngineDeps {
    pub local_watcher: Box<dyn DirectoryWatcher>,
    pub cloud_watcher: Box<dyn DirectoryWatcher>,
    pub cloud_store: Arc<dyn CloudStore>,
    pub bookmarks: Arc<dyn BookmarkLoader>,
    pub state: Arc<dyn SyncStateStore>,
    pub activity: Arc<dyn BackgroundActivity>,
}

/// The watchers, shareable with the supervisor and lifecycle tasks.
struct Watchers {
    local: Mutex<Box<dyn DirectoryWatcher>>,
    cloud: Mutex<Box<dyn DirectoryWatcher>>,
}

impl Watchers {
    async fn pause_all(&self) {
        self.cloud.lock().await.pause().await;
        self.local.lock().await.pause().await;
    }

    async fn resume_all(&self) {
        self.cloud.lock().await.resume().await;
        self.local.lock().await.resume().await;
    }

    async fn stop_all(&self) {
        self.cloud.lock().await.stop().await;
        self.local.lock().await.stop().await;
    }
}

/// Orchestrates the watchers, the Reconciler, and the I/O workers for
/// one synchronization session.
pub struct SyncEngine {
    documents_dir: PathBuf,
    watchers: Arc<Watchers>,
    cloud_store: Arc<dyn CloudStore>,
    bookmarks: Arc<dyn BookmarkLoader>,
    state: Arc<dyn SyncStateStore>,
    activity: Arc<dyn BackgroundActivity>,
    cancel: CancellationToken,
    stopped: Arc<AtomicBool>,
    busy: Arc<AtomicBool>,
    batch_done: Arc<Notify>,
    lane: Option<JoinHandle<()>>,
    supervisor: Option<JoinHandle<()>>,
    running: bool,
}

impl SyncEngine {
    pub fn new(documents_dir: PathBuf, deps: EngineDeps) -> Self {
        Self {
            documents_dir,
            watchers: Arc::new(Watchers {
                local: Mutex::new(deps.local_watcher),
                cloud: Mutex::new(deps.cloud_watcher),
            }),
            cloud_store: deps.cloud_store,
            bookmarks: deps.bookmarks,
            state: deps.state,
            activity: deps.activity,
            cancel: CancellationToken::new(),
            stopped: Arc::new(AtomicBool::new(false)),
            busy: Arc::new(AtomicBool::new(false)),
            batch_done: Arc::new(Notify::new()),
            lane: None,
            supervisor: None,
            running: false,
        }
    }

    /// Builds an engine with the default watchers over the configured
    /// documents directory and the host's metadata query.
    pub fn from_config(
        config: &Config,
        source: Arc<dyn CloudMetadataSource>,
        store: Arc<dyn CloudStore>,
        bookmarks: Arc<dyn BookmarkLoader>,
        state: Arc<dyn SyncStateStore>,
        activity: Arc<dyn BackgroundActivity>,
    ) -> Self {
        let deps = EngineDeps {
            local_watcher: Box::new(LocalDirectoryWatcher::new(&config.sync)),
            cloud_watcher: Box::new(CloudMetadataWatcher::new(
                source,
                Duration::from_millis(config.sync.cloud_poll_interval_ms),
            )),
            cloud_store: store,
            bookmarks,
            state,
            activity,
        };
        Self::new(config.sync.documents_dir.clone(), deps)
    }

    /// Starts a synchronization session.
    ///
    /// The cloud watcher starts first; its first successful gathering
    /// gates the local watcher. A local watcher start failure is fatal.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        if self.running {
            return Ok(());
        }

        self.cancel = CancellationToken::new();
        self.stopped.store(false, Ordering::SeqCst);

        let initial_sync = !self.state.did_finish_initial_sync();
        info!(initial_sync, "starting synchronization session");

        let (report_tx, report_rx) = mpsc::channel(REPORT_CHANNEL_CAPACITY);
        let lane = Lane {
            reconciler: Reconciler::new(initial_sync),
            workers: IoWorkers::new(self.documents_dir.clone(), self.cloud_store.clone()),
            bookmarks: self.bookmarks.clone(),
            state: self.state.clone(),
            stopped: self.stopped.clone(),
            busy: self.busy.clone(),
            batch_done: self.batch_done.clone(),
            cancel: self.cancel.clone(),
            reload_needed: false,
        };
        self.lane = Some(tokio::spawn(lane.run(report_rx)));

        // Fatal errors cancel the token from inside the lane; this task
        // makes sure the watchers come down with the session.
        let watchers = self.watchers.clone();
        let cancel = self.cancel.clone();
        self.supervisor = Some(tokio::spawn(async move {
            cancel.cancelled().await;
            watchers.stop_all().await;
        }));

        self.running = true;

        // The lock guards must drop before stop() can re-acquire them on
        // the failure paths.
        let cloud_started = {
            let mut cloud = self.watchers.cloud.lock().await;
            cloud.start(report_tx.clone()).await
        };
        if let Err(err) = cloud_started {
            self.stop().await;
            return Err(anyhow::Error::new(err).context("cloud watcher failed to start"));
        }

        let local_started = {
            let mut local = self.watchers.local.lock().await;
            local.start(report_tx).await
        };
        if let Err(err) = local_started {
            self.stop().await;
            return Err(anyhow::Error::new(err).context("local watcher failed to start"));
        }

        Ok(())
    }

    /// Ends the session: remaining lane work becomes a no-op, both
    /// watchers stop, and retained reconciliation state is discarded.
    pub async fn stop(&mut self) {
        if !self.running {
            return;
        }
        info!("stopping synchronization session");
        self.stopped.store(true, Ordering::SeqCst);
        self.cancel.cancel();
        if let Some(supervisor) = self.supervisor.take() {
            let _ = supervisor.await;
        }
        // Watcher stop is idempotent; this covers a watcher that won the
        // race against the supervisor and started after it ran.
        self.watchers.stop_all().await;
        if let Some(lane) = self.lane.take() {
            let _ = lane.await;
        }
        self.running = false;
    }

    /// The application returned to the foreground: resume observation.
    pub async fn handle_foreground(&self) {
        if !self.running || self.is_stopped() {
            return;
        }
        self.watchers.resume_all().await;
    }

    /// The application left the foreground.
    ///
    /// With a batch in flight a background-execution grant keeps the
    /// lane going; the watchers pause when the grant expires (or the
    /// batch finishes). With nothing in flight the watchers pause
    /// immediately.
    pub async fn handle_background(&self) {
        if !self.running || self.is_stopped() {
            return;
        }
        if self.busy.load(Ordering::SeqCst) {
            info!("entering background with a sync batch in flight");
            let grant = self.activity.begin("cloudshelf-sync");
            let watchers = self.watchers.clone();
            let cancel = self.cancel.clone();
            let batch_done = self.batch_done.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = grant.expired() => {
                        info!("background grant expired, pausing watchers");
                    }
                    _ = batch_done.notified() => {
                        debug!("batch finished in background, pausing watchers");
                    }
                    _ = cancel.cancelled() => return,
                }
                watchers.pause_all().await;
            });
        } else {
            self.watchers.pause_all().await;
        }
    }

    /// True between a successful [`start`](Self::start) and
    /// [`stop`](Self::stop).
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// True once a fatal error (or an explicit stop) ended the session.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Per-batch counters, logged when the batch completes.
#[derive(Debug, Default)]
struct BatchStats {
    local_writes: u32,
    local_removals: u32,
    cloud_writes: u32,
    cloud_removals: u32,
    downloads: u32,
    conflicts: u32,
    preserved: u32,
    errors: u32,
}

/// The serialized work lane: sole owner of the Reconciler and of all
/// I/O dispatch.
struct Lane {
    reconciler: Reconciler,
    workers: IoWorkers,
    bookmarks: Arc<dyn BookmarkLoader>,
    state: Arc<dyn SyncStateStore>,
    stopped: Arc<AtomicBool>,
    busy: Arc<AtomicBool>,
    batch_done: Arc<Notify>,
    cancel: CancellationToken,
    reload_needed: bool,
}

impl Lane {
    async fn run(mut self, mut reports: mpsc::Receiver<WatcherReport>) {
        debug!("sync lane started");
        loop {
            let report = tokio::select! {
                _ = self.cancel.cancelled() => break,
                report = reports.recv() => match report {
                    Some(report) => report,
                    None => break,
                },
            };
            if self.stopped.load(Ordering::SeqCst) {
                continue;
            }
            match report {
                WatcherReport::Event(event) => self.process(event).await,
                WatcherReport::Error(err) => self.classify(err),
            }
        }
        debug!("sync lane stopped");
    }

    /// Resolves one observation and executes the resulting batch.
    async fn process(&mut self, event: WatcherEvent) {
        let actions = self.reconciler.resolve(event);
        if actions.is_empty() {
            return;
        }

        self.busy.store(true, Ordering::SeqCst);
        let mut stats = BatchStats::default();
        debug!(actions = actions.len(), "executing sync batch");

        for action in actions {
            // A fatal error drains the rest of the batch to no-ops.
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }
            self.execute(action, &mut stats).await;
        }

        if self.reload_needed && !self.stopped.load(Ordering::SeqCst) {
            // Clear before calling so overlapping batches collapse to a
            // single reload.
            self.reload_needed = false;
            self.bookmarks.load_bookmarks();
        }

        info!(
            local_writes = stats.local_writes,
            local_removals = stats.local_removals,
            cloud_writes = stats.cloud_writes,
            cloud_removals = stats.cloud_removals,
            downloads = stats.downloads,
            conflicts = stats.conflicts,
            preserved = stats.preserved,
            errors = stats.errors,
            "sync batch completed"
        );
        self.busy.store(false, Ordering::SeqCst);
        self.batch_done.notify_waiters();
    }

    /// Dispatches one action to its worker. Per-item failures never
    /// cancel sibling actions in the same batch.
    async fn execute(&mut self, action: SyncAction, stats: &mut BatchStats) {
        debug!(
            kind = action.kind(),
            item = action.item_name().unwrap_or("-"),
            "dispatching action"
        );

        let outcome = match action {
            SyncAction::CreateLocal(item) | SyncAction::UpdateLocal(item) => {
                let result = self.workers.write_local(&item).await;
                if result.is_ok() {
                    stats.local_writes += 1;
                    self.reload_needed = true;
                }
                result
            }
            SyncAction::RemoveLocal(item) => match self.workers.remove_local(&item).await {
                Ok(removed) => {
                    stats.local_removals += u32::from(removed);
                    self.reload_needed = true;
                    Ok(())
                }
                Err(err) => Err(err),
            },
            SyncAction::StartDownload(item) => {
                let result = self.workers.request_download(&item).await;
                if result.is_ok() {
                    stats.downloads += 1;
                }
                result
            }
            SyncAction::CreateCloud(item) | SyncAction::UpdateCloud(item) => {
                let result = self.workers.write_cloud(&item).await;
                if result.is_ok() {
                    stats.cloud_writes += 1;
                }
                result
            }
            SyncAction::RemoveCloud(item) => {
                let result = self.workers.remove_cloud(&item).await;
                if result.is_ok() {
                    stats.cloud_removals += 1;
                }
                result
            }
            SyncAction::ResolveVersionsConflict(item) => {
                let result = self.workers.resolve_versions(&item).await;
                if result.is_ok() {
                    stats.conflicts += 1;
                    self.reload_needed = true;
                }
                result
            }
            SyncAction::PreserveLocalCopy(item) => {
                let result = self.workers.preserve_local_copy(&item).await;
                if result.is_ok() {
                    stats.preserved += 1;
                }
                result
            }
            SyncAction::InitialSyncFinished => {
                info!("initial synchronization completed");
                self.state
                    .set_did_finish_initial_sync(true)
                    .map_err(|e| SyncError::Internal(format!("record initial sync: {e}")))
            }
            SyncAction::ReportError(err) => {
                self.classify(err);
                Ok(())
            }
        };

        if let Err(err) = outcome {
            stats.errors += 1;
            self.classify(err);
        }
    }

    /// Classifies an error per the taxonomy: fatal errors stop the
    /// session, everything else is logged per-item and recovered via the
    /// next snapshot. Errors never touch the Reconciler's snapshots.
    fn classify(&mut self, err: SyncError) {
        if err.is_fatal() {
            error!(error = %err, "fatal synchronization error, stopping session");
            self.stopped.store(true, Ordering::SeqCst);
            self.cancel.cancel();
        } else {
            warn!(error = %err, "synchronization error");
        }
    }
}
