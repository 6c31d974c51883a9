//! Cloud container watcher
//!
//! Drives the host's metadata query adapter ([`CloudMetadataSource`]):
//! the first successful snapshot becomes
//! [`WatcherEvent::CloudGatheringFinished`], after which a polling loop
//! (~1 s batching interval) emits [`WatcherEvent::CloudUpdated`] whenever
//! the snapshot differs from the last one delivered.
//!
//! Transient query failures are logged and retried on the next tick; a
//! fatal failure (the user signed out, the container vanished) is
//! reported to the engine and ends the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cloudshelf_core::domain::{CloudSet, SyncError, WatcherEvent};
use cloudshelf_core::ports::{CloudMetadataSource, DirectoryWatcher, WatcherReport};

/// Watches the ubiquitous container by polling the metadata query.
pub struct CloudMetadataWatcher {
    source: Arc<dyn CloudMetadataSource>,
    poll_interval: Duration,
    paused: Arc<AtomicBool>,
    shutdown: Option<CancellationToken>,
    poll_task: Option<JoinHandle<()>>,
}

impl CloudMetadataWatcher {
    pub fn new(source: Arc<dyn CloudMetadataSource>, poll_interval: Duration) -> Self {
        Self {
            source,
            poll_interval,
            paused: Arc::new(AtomicBool::new(false)),
            shutdown: None,
            poll_task: None,
        }
    }
}

#[async_trait::async_trait]
impl DirectoryWatcher for CloudMetadataWatcher {
    async fn start(&mut self, reports: mpsc::Sender<WatcherReport>) -> Result<(), SyncError> {
        info!("gathering cloud metadata");
        let first = self.source.snapshot().await?;
        reports
            .send(WatcherReport::Event(WatcherEvent::CloudGatheringFinished(
                first.clone(),
            )))
            .await
            .map_err(|_| SyncError::Internal("engine lane is gone".to_string()))?;

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(poll_metadata(
            self.source.clone(),
            reports,
            first,
            self.poll_interval,
            self.paused.clone(),
            shutdown.clone(),
        ));

        self.paused.store(false, Ordering::SeqCst);
        self.shutdown = Some(shutdown);
        self.poll_task = Some(task);
        Ok(())
    }

    async fn pause(&mut self) {
        debug!("cloud watcher paused");
        self.paused.store(true, Ordering::SeqCst);
    }

    async fn resume(&mut self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            debug!("cloud watcher resumed");
        }
    }

    async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.cancel();
        }
        if let Some(task) = self.poll_task.take() {
            let _ = task.await;
        }
        info!("cloud watcher stopped");
    }
}

async fn poll_metadata(
    source: Arc<dyn CloudMetadataSource>,
    reports: mpsc::Sender<WatcherReport>,
    mut last: CloudSet,
    poll_interval: Duration,
    paused: Arc<AtomicBool>,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if paused.load(Ordering::SeqCst) {
            continue;
        }

        match source.snapshot().await {
            Ok(snapshot) => {
                if snapshot == last {
                    continue;
                }
                debug!(items = snapshot.len(), "cloud metadata changed");
                last = snapshot.clone();
                if reports
                    .send(WatcherReport::Event(WatcherEvent::CloudUpdated(snapshot)))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Err(err) if err.is_fatal() => {
                // Availability changes (sign-out, missing container) end
                // the session; the engine classifies and stops.
                let _ = reports.send(WatcherReport::Error(err)).await;
                break;
            }
            Err(err) => {
                // Transient; the next tick retries implicitly.
                warn!(error = %err, "cloud metadata query failed");
            }
        }
    }
    debug!("cloud metadata poll loop exited");
}
