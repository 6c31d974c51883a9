//! Local documents watcher
//!
//! Wraps the `notify` crate to observe the user's documents directory.
//! One [`WatcherEvent::LocalGatheringFinished`] is produced per start
//! from an initial scan; afterwards every coalesced burst of filesystem
//! changes produces a [`WatcherEvent::LocalUpdated`] built from a fresh
//! rescan, so the Reconciler's input is always a complete snapshot.
//!
//! ## Architecture
//!
//! ```text
//! inotify ──→ notify callback ──→ tick channel ──→ debounce pump ──→ rescan ──→ reports
//! ```
//!
//! Raw OS events only tick the pump; the pump waits for the directory to
//! stay quiet for the debounce window (~200 ms) before rescanning. Ticks
//! are filtered to the single accepted document extension.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use cloudshelf_core::config::SyncConfig;
use cloudshelf_core::domain::{truncate_to_seconds, LocalItem, LocalSet, SyncError, WatcherEvent};
use cloudshelf_core::ports::{DirectoryWatcher, WatcherReport};

/// Watches the local documents directory for changes.
pub struct LocalDirectoryWatcher {
    documents_dir: PathBuf,
    extension: String,
    content_type: String,
    debounce: Duration,
    paused: Arc<AtomicBool>,
    reports: Option<mpsc::Sender<WatcherReport>>,
    watcher: Option<RecommendedWatcher>,
    shutdown: Option<CancellationToken>,
    pump: Option<JoinHandle<()>>,
}

impl LocalDirectoryWatcher {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            documents_dir: config.documents_dir.clone(),
            extension: config.document_extension.clone(),
            content_type: config.document_content_type.clone(),
            debounce: Duration::from_millis(config.local_debounce_ms),
            paused: Arc::new(AtomicBool::new(false)),
            reports: None,
            watcher: None,
            shutdown: None,
            pump: None,
        }
    }
}

#[async_trait::async_trait]
impl DirectoryWatcher for LocalDirectoryWatcher {
    async fn start(&mut self, reports: mpsc::Sender<WatcherReport>) -> Result<(), SyncError> {
        // The documents directory may not exist yet on first run.
        tokio::fs::create_dir_all(&self.documents_dir)
            .await
            .map_err(|e| {
                SyncError::Internal(format!(
                    "create documents directory {}: {e}",
                    self.documents_dir.display()
                ))
            })?;

        info!(dir = %self.documents_dir.display(), "gathering local documents");
        let snapshot =
            scan_documents(&self.documents_dir, &self.extension, &self.content_type).await?;
        reports
            .send(WatcherReport::Event(WatcherEvent::LocalGatheringFinished(
                snapshot,
            )))
            .await
            .map_err(|_| SyncError::Internal("engine lane is gone".to_string()))?;

        // Raw events only tick the pump; a pending tick already covers
        // everything that happens before the next rescan.
        let (tick_tx, tick_rx) = mpsc::channel::<()>(16);
        let extension = self.extension.clone();
        let mut watcher = RecommendedWatcher::new(
            move |result: Result<notify::Event, notify::Error>| match result {
                Ok(event) => {
                    if touches_extension(&event, &extension) {
                        let _ = tick_tx.try_send(());
                    }
                }
                Err(err) => {
                    error!(error = %err, "local watcher error");
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| SyncError::Internal(format!("create filesystem watcher: {e}")))?;

        watcher
            .watch(&self.documents_dir, RecursiveMode::Recursive)
            .map_err(|e| {
                SyncError::Internal(format!(
                    "watch {}: {e}",
                    self.documents_dir.display()
                ))
            })?;

        let shutdown = CancellationToken::new();
        let pump = tokio::spawn(pump_changes(
            tick_rx,
            reports.clone(),
            self.documents_dir.clone(),
            self.extension.clone(),
            self.content_type.clone(),
            self.debounce,
            self.paused.clone(),
            shutdown.clone(),
        ));

        self.paused.store(false, Ordering::SeqCst);
        self.reports = Some(reports);
        self.watcher = Some(watcher);
        self.shutdown = Some(shutdown);
        self.pump = Some(pump);
        Ok(())
    }

    async fn pause(&mut self) {
        debug!("local watcher paused");
        self.paused.store(true, Ordering::SeqCst);
    }

    async fn resume(&mut self) {
        if !self.paused.swap(false, Ordering::SeqCst) {
            return;
        }
        debug!("local watcher resumed");
        // Catch up on anything that changed while paused.
        if let Some(reports) = &self.reports {
            match scan_documents(&self.documents_dir, &self.extension, &self.content_type).await {
                Ok(snapshot) => {
                    let _ = reports
                        .send(WatcherReport::Event(WatcherEvent::LocalUpdated(snapshot)))
                        .await;
                }
                Err(err) => {
                    let _ = reports.send(WatcherReport::Error(err)).await;
                }
            }
        }
    }

    async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.cancel();
        }
        // Dropping the notify watcher stops the OS watch.
        self.watcher = None;
        self.reports = None;
        if let Some(pump) = self.pump.take() {
            let _ = pump.await;
        }
        info!("local watcher stopped");
    }
}

/// True when the event concerns a document with the accepted extension.
/// Access events never trigger a rescan.
fn touches_extension(event: &notify::Event, extension: &str) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|path| has_extension(path, extension))
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map_or(false, |e| e.eq_ignore_ascii_case(extension))
}

/// Waits for bursts of ticks to go quiet, then rescans and reports.
#[allow(clippy::too_many_arguments)]
async fn pump_changes(
    mut ticks: mpsc::Receiver<()>,
    reports: mpsc::Sender<WatcherReport>,
    documents_dir: PathBuf,
    extension: String,
    content_type: String,
    debounce: Duration,
    paused: Arc<AtomicBool>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            tick = ticks.recv() => {
                if tick.is_none() {
                    break;
                }
                // Coalesce: keep absorbing ticks until the directory has
                // been quiet for the debounce window.
                loop {
                    match tokio::time::timeout(debounce, ticks.recv()).await {
                        Ok(Some(())) => continue,
                        Ok(None) => return,
                        Err(_) => break,
                    }
                }
                if paused.load(Ordering::SeqCst) {
                    debug!("dropping change burst while paused");
                    continue;
                }
                match scan_documents(&documents_dir, &extension, &content_type).await {
                    Ok(snapshot) => {
                        debug!(items = snapshot.len(), "local change burst settled");
                        if reports
                            .send(WatcherReport::Event(WatcherEvent::LocalUpdated(snapshot)))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "local rescan failed");
                        if reports.send(WatcherReport::Error(err)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
    debug!("local change pump exited");
}

/// Produces a complete snapshot of the documents directory, filtered to
/// the accepted extension.
pub(crate) async fn scan_documents(
    dir: &Path,
    extension: &str,
    content_type: &str,
) -> Result<LocalSet, SyncError> {
    let mut snapshot = LocalSet::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| SyncError::Internal(format!("read {}: {e}", dir.display())))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| SyncError::Internal(format!("enumerate {}: {e}", dir.display())))?
    {
        let path = entry.path();
        if !has_extension(&path, extension) {
            continue;
        }
        let metadata = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(err) => {
                // The file may have vanished mid-scan; the next burst
                // will pick the truth up.
                warn!(path = %path.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().into_owned();
        let modified_at = metadata.modified().map(truncate_to_seconds).unwrap_or(0);
        // Creation time is unavailable on some filesystems.
        let created_at = metadata
            .created()
            .map(truncate_to_seconds)
            .unwrap_or(modified_at);

        snapshot.insert(
            LocalItem::new(name, path, content_type, created_at, modified_at)
                .with_size(metadata.len()),
        );
    }

    Ok(snapshot)
}
