//! I/O workers for the serialized work lane
//!
//! [`IoWorkers`] holds the read/write/delete/download primitives the
//! engine dispatches sync actions onto. All writes are atomic (temp file
//! plus rename) so the cloud sync daemon and other processes observe
//! complete files, and every write stamps the destination's modification
//! time to the source item's `modified_at` *after* the bytes land, so the
//! next metadata snapshot compares equal on both sides instead of
//! bouncing an update back.
//!
//! Workers occupy the lane for their duration; only download requests
//! return immediately after asking the store to materialize bytes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use tracing::{debug, instrument, warn};

use cloudshelf_conflict::{latest_version, PreservedCopyNamer};
use cloudshelf_core::domain::{CloudItem, LocalItem, SyncError};
use cloudshelf_core::ports::CloudStore;

/// Name of the trash subdirectory inside the cloud container.
const TRASH_DIR: &str = ".Trash";

/// Blocking I/O primitives bound to one engine instance.
///
/// The container URL is resolved through the store on first use and
/// cached for the engine's lifetime.
pub struct IoWorkers {
    documents_dir: PathBuf,
    store: Arc<dyn CloudStore>,
    container: Option<PathBuf>,
}

impl IoWorkers {
    pub fn new(documents_dir: PathBuf, store: Arc<dyn CloudStore>) -> Self {
        Self {
            documents_dir,
            store,
            container: None,
        }
    }

    /// Resolves and caches the cloud container root.
    async fn container(&mut self) -> Result<PathBuf, SyncError> {
        if let Some(url) = &self.container {
            return Ok(url.clone());
        }
        let url = self.store.container_url().await?;
        debug!(container = %url.display(), "resolved cloud container");
        self.container = Some(url.clone());
        Ok(url)
    }

    /// Copies a cloud item's bytes into the documents directory and
    /// stamps the local file's modification time to the item's.
    #[instrument(skip(self), fields(name = %item.name))]
    pub async fn write_local(&mut self, item: &CloudItem) -> Result<(), SyncError> {
        let data = tokio::fs::read(&item.url)
            .await
            .map_err(|e| io_error("read cloud item", &item.url, e))?;
        let target = self.documents_dir.join(&item.name);
        atomic_write(&target, &data).await?;
        set_modified_seconds(&target, item.modified_at).await?;
        debug!(bytes = data.len(), "local write complete");
        Ok(())
    }

    /// Deletes the local document matching a trashed cloud item, if it
    /// still exists. Returns whether a file was removed.
    #[instrument(skip(self), fields(name = %item.name))]
    pub async fn remove_local(&self, item: &CloudItem) -> Result<bool, SyncError> {
        let target = self.documents_dir.join(&item.name);
        match tokio::fs::remove_file(&target).await {
            Ok(()) => {
                debug!("local file removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error("remove local file", &target, e)),
        }
    }

    /// Asks the cloud store to materialize an item's bytes. Completion
    /// is observed via the next metadata snapshot.
    #[instrument(skip(self), fields(name = %item.name))]
    pub async fn request_download(&self, item: &CloudItem) -> Result<(), SyncError> {
        self.store.start_downloading(item).await
    }

    /// Copies a local document into the cloud container and stamps the
    /// cloud file's modification time to the document's.
    #[instrument(skip(self), fields(name = %item.name))]
    pub async fn write_cloud(&mut self, item: &LocalItem) -> Result<(), SyncError> {
        let container = self.container().await?;
        let data = tokio::fs::read(&item.url)
            .await
            .map_err(|e| io_error("read local document", &item.url, e))?;
        let target = container.join(&item.name);
        atomic_write(&target, &data).await?;
        set_modified_seconds(&target, item.modified_at).await?;
        debug!(bytes = data.len(), "cloud write complete");
        Ok(())
    }

    /// Moves the cloud document with the given name into the container's
    /// trash. A stale trash entry with the same name is deleted first to
    /// keep trash names unique.
    #[instrument(skip(self), fields(name = %item.name))]
    pub async fn remove_cloud(&mut self, item: &LocalItem) -> Result<(), SyncError> {
        let container = self.container().await?;
        let live = container.join(&item.name);
        if !tokio::fs::try_exists(&live)
            .await
            .map_err(|e| io_error("probe cloud file", &live, e))?
        {
            debug!("no live cloud file to trash");
            return Ok(());
        }

        let trash_dir = container.join(TRASH_DIR);
        tokio::fs::create_dir_all(&trash_dir)
            .await
            .map_err(|e| io_error("create trash directory", &trash_dir, e))?;

        let trash_target = trash_dir.join(&item.name);
        match tokio::fs::remove_file(&trash_target).await {
            Ok(()) => debug!("replaced stale trash entry"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error("remove stale trash entry", &trash_target, e)),
        }

        tokio::fs::rename(&live, &trash_target)
            .await
            .map_err(|e| io_error("move cloud file to trash", &live, e))?;
        debug!("cloud file moved to trash");
        Ok(())
    }

    /// Collapses an item's concurrent versions onto the latest one.
    ///
    /// The current content is copied aside under a generated name before
    /// being replaced, so no edit is lost; the remaining alternate
    /// versions are then cleared.
    #[instrument(skip(self), fields(name = %item.name))]
    pub async fn resolve_versions(&mut self, item: &CloudItem) -> Result<(), SyncError> {
        let container = self.container().await?;
        let versions = self.store.versions(&item.url).await?;
        let latest = latest_version(&versions)
            .map_err(|e| SyncError::Internal(format!("{}: {e}", item.name)))?
            .clone();

        let preserved = PreservedCopyNamer::next_unused(&item.name, |candidate| {
            container.join(candidate).exists()
        });
        let preserved_path = container.join(&preserved);
        tokio::fs::copy(&item.url, &preserved_path)
            .await
            .map_err(|e| io_error("preserve current version", &preserved_path, e))?;

        self.store.replace_with_version(&item.url, &latest).await?;
        self.store.remove_other_versions(&item.url).await?;
        debug!(
            winner_modified_at = latest.modified_at,
            preserved_as = %preserved,
            "versions conflict collapsed"
        );
        Ok(())
    }

    /// Renames a local document to a generated name so it survives the
    /// first-ever merge and re-appears as a fresh upload on a later scan.
    #[instrument(skip(self), fields(name = %item.name))]
    pub async fn preserve_local_copy(&self, item: &LocalItem) -> Result<(), SyncError> {
        let preserved = PreservedCopyNamer::next_unused(&item.name, |candidate| {
            self.documents_dir.join(candidate).exists()
        });
        let target = self.documents_dir.join(&preserved);
        match tokio::fs::rename(&item.url, &target).await {
            Ok(()) => {
                debug!(preserved_as = %preserved, "local copy preserved");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // The document vanished between the snapshot and now;
                // there is nothing left to preserve.
                warn!("local document disappeared before preservation");
                Ok(())
            }
            Err(e) => Err(io_error("preserve local copy", &item.url, e)),
        }
    }
}

/// Writes `data` to `target` atomically: the bytes land in a temporary
/// file in the same directory, which is then renamed over the target so
/// concurrent readers never observe a partial file.
pub async fn atomic_write(target: &Path, data: &[u8]) -> Result<(), SyncError> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error("create parent directory", parent, e))?;
    }

    let tmp_path = {
        let mut p = target.as_os_str().to_owned();
        p.push(".tmp");
        PathBuf::from(p)
    };

    tokio::fs::write(&tmp_path, data)
        .await
        .map_err(|e| io_error("write temporary file", &tmp_path, e))?;
    tokio::fs::rename(&tmp_path, target)
        .await
        .map_err(|e| io_error("rename temporary file", target, e))?;
    Ok(())
}

/// Stamps a file's modification time to `seconds` since the epoch.
///
/// Runs after the byte write so the stamped time survives; without the
/// stamp the next snapshot would see the write time and echo the change
/// back to the other side.
pub async fn set_modified_seconds(path: &Path, seconds: i64) -> Result<(), SyncError> {
    let path = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let time = UNIX_EPOCH + Duration::from_secs(seconds.max(0) as u64);
        let file = std::fs::OpenOptions::new().write(true).open(&path)?;
        file.set_modified(time)
    })
    .await
    .map_err(|e| SyncError::Internal(format!("set_modified task: {e}")))?;
    result.map_err(|e| SyncError::Internal(format!("set modification time: {e}")))
}

fn io_error(operation: &str, path: &Path, error: std::io::Error) -> SyncError {
    SyncError::Internal(format!("{operation} {}: {error}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use cloudshelf_core::domain::truncate_to_seconds;
    use cloudshelf_core::ports::ItemVersion;

    const EPUB: &str = "application/epub+zip";

    /// Store backed by a plain directory; version operations are plain
    /// file copies so the resolution flow can be exercised end to end.
    struct DirStore {
        container: PathBuf,
        downloads: Mutex<Vec<String>>,
        versions: Mutex<Vec<ItemVersion>>,
    }

    impl DirStore {
        fn new(container: PathBuf) -> Self {
            Self {
                container,
                downloads: Mutex::new(Vec::new()),
                versions: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CloudStore for DirStore {
        async fn container_url(&self) -> Result<PathBuf, SyncError> {
            Ok(self.container.clone())
        }

        async fn start_downloading(&self, item: &CloudItem) -> Result<(), SyncError> {
            self.downloads.lock().unwrap().push(item.name.clone());
            Ok(())
        }

        async fn versions(&self, _url: &Path) -> Result<Vec<ItemVersion>, SyncError> {
            Ok(self.versions.lock().unwrap().clone())
        }

        async fn replace_with_version(
            &self,
            url: &Path,
            version: &ItemVersion,
        ) -> Result<(), SyncError> {
            std::fs::copy(&version.url, url)
                .map_err(|e| SyncError::Internal(e.to_string()))?;
            Ok(())
        }

        async fn remove_other_versions(&self, _url: &Path) -> Result<(), SyncError> {
            self.versions.lock().unwrap().clear();
            Ok(())
        }
    }

    fn workers(docs: &Path, container: &Path) -> (IoWorkers, Arc<DirStore>) {
        let store = Arc::new(DirStore::new(container.to_path_buf()));
        (
            IoWorkers::new(docs.to_path_buf(), store.clone()),
            store,
        )
    }

    fn modified_seconds(path: &Path) -> i64 {
        truncate_to_seconds(std::fs::metadata(path).unwrap().modified().unwrap())
    }

    #[tokio::test]
    async fn test_atomic_write_creates_parents_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("a.epub");
        atomic_write(&target, b"book bytes").await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"book bytes");
        // No temporary file remains.
        assert!(!dir.path().join("nested").join("a.epub.tmp").exists());
    }

    #[tokio::test]
    async fn test_set_modified_seconds_stamps_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a.epub");
        std::fs::write(&target, b"x").unwrap();
        set_modified_seconds(&target, 1_600_000_000).await.unwrap();
        assert_eq!(modified_seconds(&target), 1_600_000_000);
    }

    #[tokio::test]
    async fn test_write_local_copies_bytes_and_stamps_time() {
        let docs = tempfile::tempdir().unwrap();
        let container = tempfile::tempdir().unwrap();
        let source = container.path().join("a.epub");
        std::fs::write(&source, b"cloud bytes").unwrap();

        let (mut workers, _) = workers(docs.path(), container.path());
        let item = CloudItem::new("a.epub", &source, EPUB, 0, 1_650_000_000);
        workers.write_local(&item).await.unwrap();

        let written = docs.path().join("a.epub");
        assert_eq!(std::fs::read(&written).unwrap(), b"cloud bytes");
        assert_eq!(modified_seconds(&written), 1_650_000_000);
    }

    #[tokio::test]
    async fn test_remove_local_tolerates_missing_file() {
        let docs = tempfile::tempdir().unwrap();
        let container = tempfile::tempdir().unwrap();
        let (workers, _) = workers(docs.path(), container.path());

        let item = CloudItem::new("gone.epub", "/container/gone.epub", EPUB, 0, 1).in_trash();
        assert!(!workers.remove_local(&item).await.unwrap());

        std::fs::write(docs.path().join("gone.epub"), b"x").unwrap();
        assert!(workers.remove_local(&item).await.unwrap());
        assert!(!docs.path().join("gone.epub").exists());
    }

    #[tokio::test]
    async fn test_write_cloud_lands_in_container() {
        let docs = tempfile::tempdir().unwrap();
        let container = tempfile::tempdir().unwrap();
        let source = docs.path().join("b.epub");
        std::fs::write(&source, b"local bytes").unwrap();

        let (mut workers, _) = workers(docs.path(), container.path());
        let item = LocalItem::new("b.epub", &source, EPUB, 0, 1_640_000_000);
        workers.write_cloud(&item).await.unwrap();

        let written = container.path().join("b.epub");
        assert_eq!(std::fs::read(&written).unwrap(), b"local bytes");
        assert_eq!(modified_seconds(&written), 1_640_000_000);
    }

    #[tokio::test]
    async fn test_remove_cloud_moves_to_trash_and_replaces_stale_entry() {
        let docs = tempfile::tempdir().unwrap();
        let container = tempfile::tempdir().unwrap();
        std::fs::write(container.path().join("c.epub"), b"live").unwrap();
        let trash = container.path().join(TRASH_DIR);
        std::fs::create_dir_all(&trash).unwrap();
        std::fs::write(trash.join("c.epub"), b"stale").unwrap();

        let (mut workers, _) = workers(docs.path(), container.path());
        let item = LocalItem::new("c.epub", docs.path().join("c.epub"), EPUB, 0, 1);
        workers.remove_cloud(&item).await.unwrap();

        assert!(!container.path().join("c.epub").exists());
        assert_eq!(std::fs::read(trash.join("c.epub")).unwrap(), b"live");
    }

    #[tokio::test]
    async fn test_remove_cloud_without_live_file_is_a_noop() {
        let docs = tempfile::tempdir().unwrap();
        let container = tempfile::tempdir().unwrap();
        let (mut workers, _) = workers(docs.path(), container.path());

        let item = LocalItem::new("d.epub", docs.path().join("d.epub"), EPUB, 0, 1);
        workers.remove_cloud(&item).await.unwrap();
        assert!(!container.path().join(TRASH_DIR).join("d.epub").exists());
    }

    #[tokio::test]
    async fn test_request_download_reaches_store() {
        let docs = tempfile::tempdir().unwrap();
        let container = tempfile::tempdir().unwrap();
        let (workers, store) = workers(docs.path(), container.path());

        let item = CloudItem::new("e.epub", "/container/e.epub", EPUB, 0, 1).not_downloaded();
        workers.request_download(&item).await.unwrap();
        assert_eq!(*store.downloads.lock().unwrap(), vec!["e.epub"]);
    }

    #[tokio::test]
    async fn test_resolve_versions_keeps_latest_and_preserves_current() {
        let docs = tempfile::tempdir().unwrap();
        let container = tempfile::tempdir().unwrap();
        let current = container.path().join("f.epub");
        std::fs::write(&current, b"current edit").unwrap();
        let alternate = container.path().join("f.alternate");
        std::fs::write(&alternate, b"other device edit").unwrap();

        let (mut workers, store) = workers(docs.path(), container.path());
        *store.versions.lock().unwrap() = vec![
            ItemVersion {
                url: current.clone(),
                modified_at: 100,
            },
            ItemVersion {
                url: alternate.clone(),
                modified_at: 200,
            },
        ];

        let item = CloudItem::new("f.epub", &current, EPUB, 0, 100).with_unresolved_conflicts();
        workers.resolve_versions(&item).await.unwrap();

        // The latest version replaced the current content, and the
        // current edit survived under the generated name.
        assert_eq!(std::fs::read(&current).unwrap(), b"other device edit");
        assert_eq!(
            std::fs::read(container.path().join("f_1.epub")).unwrap(),
            b"current edit"
        );
        assert!(store.versions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_preserve_local_copy_renames_with_probing() {
        let docs = tempfile::tempdir().unwrap();
        let container = tempfile::tempdir().unwrap();
        let source = docs.path().join("g.epub");
        std::fs::write(&source, b"mine").unwrap();
        // The first candidate is taken.
        std::fs::write(docs.path().join("g_1.epub"), b"taken").unwrap();

        let (workers, _) = workers(docs.path(), container.path());
        let item = LocalItem::new("g.epub", &source, EPUB, 0, 1);
        workers.preserve_local_copy(&item).await.unwrap();

        assert!(!source.exists());
        assert_eq!(
            std::fs::read(docs.path().join("g_2.epub")).unwrap(),
            b"mine"
        );
    }
}
