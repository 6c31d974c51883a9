//! Incoming and outgoing event vocabulary
//!
//! [`WatcherEvent`] is the closed set of observations the two directory
//! watchers deliver; [`SyncAction`] is the closed set of side effects the
//! Reconciler asks the orchestration layer to execute. Both are tagged
//! unions matched exhaustively at every dispatch site, so adding a
//! variant is a compile error until all dispatchers handle it.

use super::errors::SyncError;
use super::item::{CloudItem, CloudSet, LocalItem, LocalSet, MetadataItem};

/// An observation delivered by one of the directory watchers.
#[derive(Debug, Clone, PartialEq)]
pub enum WatcherEvent {
    /// The local watcher finished its initial enumeration.
    LocalGatheringFinished(LocalSet),
    /// The cloud watcher finished its initial enumeration.
    CloudGatheringFinished(CloudSet),
    /// A coalesced burst of local filesystem changes.
    LocalUpdated(LocalSet),
    /// A cloud metadata update notification.
    CloudUpdated(CloudSet),
}

/// A side effect the Reconciler asks the orchestration layer to execute.
///
/// Actions are executed in the order returned, one task each, on the
/// serialized work lane.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    /// Copy a cloud item's bytes into the local documents directory.
    CreateLocal(CloudItem),
    /// Overwrite a local document with the newer cloud content.
    UpdateLocal(CloudItem),
    /// Delete the local document matching a trashed cloud item.
    RemoveLocal(CloudItem),
    /// Ask the cloud store to materialize an item's bytes.
    StartDownload(CloudItem),
    /// Copy a local document into the cloud container.
    CreateCloud(LocalItem),
    /// Overwrite a cloud document with the newer local content.
    UpdateCloud(LocalItem),
    /// Move a cloud document into the container's trash.
    RemoveCloud(LocalItem),
    /// Collapse a cloud item's concurrent versions onto the latest one,
    /// preserving the current content under a new name.
    ResolveVersionsConflict(CloudItem),
    /// Rename a local document so it survives the first-ever merge and
    /// re-appears as a fresh upload on a later pass.
    PreserveLocalCopy(LocalItem),
    /// The first-ever reconciliation has completed; record it durably.
    InitialSyncFinished,
    /// Surface an error to the engine's classification.
    ReportError(SyncError),
}

impl SyncAction {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncAction::CreateLocal(_) => "create_local",
            SyncAction::UpdateLocal(_) => "update_local",
            SyncAction::RemoveLocal(_) => "remove_local",
            SyncAction::StartDownload(_) => "start_download",
            SyncAction::CreateCloud(_) => "create_cloud",
            SyncAction::UpdateCloud(_) => "update_cloud",
            SyncAction::RemoveCloud(_) => "remove_cloud",
            SyncAction::ResolveVersionsConflict(_) => "resolve_versions_conflict",
            SyncAction::PreserveLocalCopy(_) => "preserve_local_copy",
            SyncAction::InitialSyncFinished => "initial_sync_finished",
            SyncAction::ReportError(_) => "report_error",
        }
    }

    /// Name of the item the action targets, when it targets one.
    pub fn item_name(&self) -> Option<&str> {
        match self {
            SyncAction::CreateLocal(item)
            | SyncAction::UpdateLocal(item)
            | SyncAction::RemoveLocal(item)
            | SyncAction::StartDownload(item)
            | SyncAction::ResolveVersionsConflict(item) => Some(item.name()),
            SyncAction::CreateCloud(item)
            | SyncAction::UpdateCloud(item)
            | SyncAction::RemoveCloud(item)
            | SyncAction::PreserveLocalCopy(item) => Some(item.name()),
            SyncAction::InitialSyncFinished | SyncAction::ReportError(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        let item = CloudItem::new("a.epub", "/container/a.epub", "application/epub+zip", 0, 1);
        assert_eq!(SyncAction::CreateLocal(item.clone()).kind(), "create_local");
        assert_eq!(
            SyncAction::StartDownload(item).kind(),
            "start_download"
        );
        assert_eq!(SyncAction::InitialSyncFinished.kind(), "initial_sync_finished");
    }

    #[test]
    fn test_item_name() {
        let cloud = CloudItem::new("a.epub", "/container/a.epub", "application/epub+zip", 0, 1);
        let local = LocalItem::new("b.epub", "/docs/b.epub", "application/epub+zip", 0, 1);
        assert_eq!(SyncAction::RemoveLocal(cloud).item_name(), Some("a.epub"));
        assert_eq!(SyncAction::CreateCloud(local).item_name(), Some("b.epub"));
        assert_eq!(SyncAction::InitialSyncFinished.item_name(), None);
        assert_eq!(
            SyncAction::ReportError(SyncError::CloudUnavailable).item_name(),
            None
        );
    }
}
