//! Cloud store ports (driven/secondary ports)
//!
//! Two interfaces cover the host's ubiquity layer:
//!
//! - [`CloudMetadataSource`] is the metadata query adapter. It produces
//!   complete [`CloudSet`] snapshots carrying download state, trash
//!   membership, unresolved-conflict flags, and per-item transfer errors.
//!   The cloud watcher drives it; the core never walks the container
//!   itself.
//! - [`CloudStore`] covers the side-effecting primitives: container
//!   resolution, byte materialization, and conflict-version collapse.
//!
//! ## Design Notes
//!
//! - `start_downloading` is fire-and-forget; completion is observed via
//!   the next metadata snapshot, never via a callback.
//! - The container URL is resolved lazily and cached by the caller; a
//!   resolution failure maps to the fatal `ContainerNotFound`.

use std::path::{Path, PathBuf};

use crate::domain::errors::SyncError;
use crate::domain::item::{CloudItem, CloudSet};

/// One concurrent version of a cloud item, as enumerated by the host's
/// version store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemVersion {
    /// Path handle for this version's bytes.
    pub url: PathBuf,
    /// Modification time in whole seconds since the epoch.
    pub modified_at: i64,
}

/// Port trait for the host's cloud metadata query.
///
/// A snapshot must include trashed items and the three per-item
/// attributes the Reconciler depends on: `is_downloaded`,
/// `has_unresolved_conflicts`, and the two error slots. An availability
/// change (the user signing out) surfaces as `Err(CloudUnavailable)`.
#[async_trait::async_trait]
pub trait CloudMetadataSource: Send + Sync {
    /// Produces a fresh, complete snapshot of the container.
    async fn snapshot(&self) -> Result<CloudSet, SyncError>;
}

/// Port trait for side-effecting cloud container operations.
#[async_trait::async_trait]
pub trait CloudStore: Send + Sync {
    /// Resolves the per-user container root.
    ///
    /// # Errors
    /// Returns [`SyncError::ContainerNotFound`] when the application's
    /// container cannot be resolved; the session stops.
    async fn container_url(&self) -> Result<PathBuf, SyncError>;

    /// Asks the store to materialize an item's bytes. Returns as soon as
    /// the request is accepted; no local filesystem effect.
    async fn start_downloading(&self, item: &CloudItem) -> Result<(), SyncError>;

    /// Enumerates the concurrent versions of the item at `url`, the
    /// current version included.
    async fn versions(&self, url: &Path) -> Result<Vec<ItemVersion>, SyncError>;

    /// Replaces the current content at `url` with the given version's
    /// content.
    async fn replace_with_version(
        &self,
        url: &Path,
        version: &ItemVersion,
    ) -> Result<(), SyncError>;

    /// Discards every version of the item at `url` other than the
    /// current one.
    async fn remove_other_versions(&self, url: &Path) -> Result<(), SyncError>;
}
