//! Reconciliation state machine
//!
//! The [`Reconciler`] is a pure, single-threaded state object. Given its
//! retained per-side snapshots and one incoming [`WatcherEvent`], it
//! produces an ordered list of [`SyncAction`]s and updates its snapshots.
//! It performs no I/O and never fails; errors the cloud layer attaches to
//! items are re-emitted as [`SyncAction::ReportError`].
//!
//! ## Flow
//!
//! ```text
//! watcher ──→ resolve(event) ──→ [SyncAction] ──→ engine ──→ I/O worker
//! ```
//!
//! All state transitions originate from fresh observations; nothing in
//! the I/O layer feeds back into the Reconciler except through the next
//! watcher snapshot.
//!
//! ## Ordering
//!
//! Within one batch, actions come out grouped as: errors, unresolved
//! conflicts, download starts, removals, creations, updates. Snapshots
//! iterate in name order, so the whole sequence is deterministic, but
//! consumers must not rely on the order of items inside one group.

use tracing::debug;

use super::errors::SyncError;
use super::event::{SyncAction, WatcherEvent};
use super::item::{CloudSet, LocalSet};

/// Pure reconciliation state machine for one sync session.
///
/// Owned by exactly one task (the engine's serialized work lane), which
/// makes it effectively single-threaded; it needs no internal locking.
#[derive(Debug)]
pub struct Reconciler {
    local: LocalSet,
    cloud: CloudSet,
    local_gathered: bool,
    cloud_gathered: bool,
    initial_sync: bool,
    /// The value `initial_sync` is restored to by [`reset`](Self::reset).
    configured_initial_sync: bool,
}

impl Reconciler {
    /// Creates a reconciler.
    ///
    /// `initial_sync` is true when there is no durable record of a prior
    /// successful full sync; the first post-gathering reconciliation then
    /// runs the local-preservation pass and clears the flag.
    pub fn new(initial_sync: bool) -> Self {
        Self {
            local: LocalSet::new(),
            cloud: CloudSet::new(),
            local_gathered: false,
            cloud_gathered: false,
            initial_sync,
            configured_initial_sync: initial_sync,
        }
    }

    /// Clears all retained state, restoring the construction-time
    /// configuration.
    pub fn reset(&mut self) {
        self.local = LocalSet::new();
        self.cloud = CloudSet::new();
        self.local_gathered = false;
        self.cloud_gathered = false;
        self.initial_sync = self.configured_initial_sync;
    }

    /// True until the first post-gathering reconciliation completes.
    pub fn is_initial_sync(&self) -> bool {
        self.initial_sync
    }

    /// Feeds one observation through the state machine.
    ///
    /// Gathering events commit the implicated snapshot but return nothing
    /// until both sides have gathered; the event completing the pair
    /// triggers the full reconciliation. Update events run the
    /// incremental diff for their side regardless of gathering state,
    /// because a watcher may deliver updates before finishing its initial
    /// walk.
    pub fn resolve(&mut self, event: WatcherEvent) -> Vec<SyncAction> {
        match event {
            WatcherEvent::LocalGatheringFinished(set) => {
                self.local = set;
                self.local_gathered = true;
                self.reconcile_if_gathered()
            }
            WatcherEvent::CloudGatheringFinished(set) => {
                self.cloud = set;
                self.cloud_gathered = true;
                self.reconcile_if_gathered()
            }
            WatcherEvent::LocalUpdated(set) => self.local_diff(set),
            WatcherEvent::CloudUpdated(set) => self.cloud_diff(set),
        }
    }

    fn reconcile_if_gathered(&mut self) -> Vec<SyncAction> {
        if !(self.local_gathered && self.cloud_gathered) {
            return Vec::new();
        }

        let was_initial = self.initial_sync;
        let mut actions = match (self.local.is_empty(), self.cloud.is_empty()) {
            (true, true) => Vec::new(),
            (true, false) => self.populate_local(),
            (false, true) => self.populate_cloud(),
            (false, false) => self.merge_both_sides(),
        };

        if was_initial {
            actions.push(SyncAction::InitialSyncFinished);
            self.initial_sync = false;
        }

        debug!(
            local = self.local.len(),
            cloud = self.cloud.len(),
            actions = actions.len(),
            initial = was_initial,
            "full reconciliation"
        );
        actions
    }

    /// Local side is empty: every non-trashed cloud item becomes a local
    /// document, gated on download state.
    fn populate_local(&self) -> Vec<SyncAction> {
        let mut downloads = Vec::new();
        let mut creations = Vec::new();
        for item in self.cloud.live_items() {
            if item.is_downloaded {
                creations.push(SyncAction::CreateLocal(item.clone()));
            } else {
                downloads.push(SyncAction::StartDownload(item.clone()));
            }
        }
        downloads.into_iter().chain(creations).collect()
    }

    /// Cloud side is empty: every local document is uploaded.
    fn populate_cloud(&self) -> Vec<SyncAction> {
        self.local
            .iter()
            .map(|item| SyncAction::CreateCloud(item.clone()))
            .collect()
    }

    /// Both sides are populated: preserve endangered local copies during
    /// the first-ever sync, then run the cloud-side diff, then the
    /// local-side diff.
    fn merge_both_sides(&mut self) -> Vec<SyncAction> {
        let mut actions = Vec::new();

        if self.initial_sync {
            // The only items at risk of data loss on first sync are local
            // documents whose name a live cloud item also claims. They
            // are renamed aside before the diffs may overwrite them.
            for item in self.local.iter() {
                if self.cloud.live(&item.name).is_some() {
                    actions.push(SyncAction::PreserveLocalCopy(item.clone()));
                }
            }
        }

        let cloud = self.cloud.clone();
        actions.extend(self.cloud_diff(cloud));
        let local = self.local.clone();
        actions.extend(self.local_diff(local));
        actions
    }

    /// Incremental local-side diff against the cloud snapshot and the
    /// previous local snapshot. Commits the new local snapshot.
    fn local_diff(&mut self, new_local: LocalSet) -> Vec<SyncAction> {
        let mut removals = Vec::new();
        let mut creations = Vec::new();
        let mut updates = Vec::new();

        // Names that vanished locally are removed from the cloud, using
        // the previous local item as payload.
        for previous in self.local.iter() {
            if !new_local.contains(&previous.name) {
                removals.push(SyncAction::RemoveCloud(previous.clone()));
            }
        }

        for item in new_local.iter() {
            match self.cloud.live(&item.name) {
                None => {
                    // No live cloud counterpart. A trashed entry only
                    // blocks the upload while it is at least as recent as
                    // the local document.
                    let create = match self.cloud.trashed(&item.name) {
                        None => true,
                        Some(trashed) => trashed.modified_at < item.modified_at,
                    };
                    if create {
                        creations.push(SyncAction::CreateCloud(item.clone()));
                    }
                }
                Some(cloud_item) => {
                    // During initial sync the preservation pass owns these
                    // names; the cloud copy must not be overwritten before
                    // the user's copy has been renamed aside.
                    if !self.initial_sync && cloud_item.modified_at < item.modified_at {
                        updates.push(SyncAction::UpdateCloud(item.clone()));
                    }
                }
            }
        }

        self.local = new_local;
        removals
            .into_iter()
            .chain(creations)
            .chain(updates)
            .collect()
    }

    /// Incremental cloud-side diff against the local snapshot. Commits
    /// the new cloud snapshot unless unresolved conflicts short-circuit
    /// the pass.
    fn cloud_diff(&mut self, new_cloud: CloudSet) -> Vec<SyncAction> {
        let mut actions = Vec::new();

        // Step 1: re-emit per-item errors reported by the cloud layer.
        // Errors do not halt the diff.
        for item in new_cloud.all_items() {
            if let Some(error) = &item.downloading_error {
                actions.push(SyncAction::ReportError(SyncError::from_cloud(
                    &item.name, error,
                )));
            }
            if let Some(error) = &item.uploading_error {
                actions.push(SyncAction::ReportError(SyncError::from_cloud(
                    &item.name, error,
                )));
            }
        }

        // Step 2: unresolved conflicts must collapse before timestamps
        // mean anything; hand them to the resolver and wait for the
        // follow-up snapshot. The cloud snapshot is deliberately not
        // committed so the post-resolution update re-enters cleanly.
        let conflicted: Vec<_> = new_cloud
            .live_items()
            .filter(|item| item.has_unresolved_conflicts)
            .cloned()
            .collect();
        if !conflicted.is_empty() {
            debug!(count = conflicted.len(), "deferring diff to conflict resolution");
            actions.extend(conflicted.into_iter().map(SyncAction::ResolveVersionsConflict));
            return actions;
        }

        let mut downloads = Vec::new();
        let mut removals = Vec::new();
        let mut creations = Vec::new();
        let mut updates = Vec::new();

        // Step 3a: trashed items where the trash is authoritative delete
        // their local counterpart. Equal timestamps mean the delete
        // happened at least as late, so trash wins on `<=`.
        for trashed in new_cloud.trashed_items() {
            let superseded = new_cloud
                .live(&trashed.name)
                .map_or(false, |live| live.modified_at > trashed.modified_at);
            if superseded {
                continue;
            }
            let Some(local) = self.local.get(&trashed.name) else {
                continue;
            };
            if local.modified_at <= trashed.modified_at && trashed.is_downloaded {
                removals.push(SyncAction::RemoveLocal(trashed.clone()));
            }
        }

        // Step 3b/3c with download gating: items whose bytes are not yet
        // materialized can only be observed; they trigger a download and
        // graduate to a concrete local write on a later snapshot.
        for item in new_cloud.live_items() {
            match self.local.get(&item.name) {
                None => {
                    if item.is_downloaded {
                        creations.push(SyncAction::CreateLocal(item.clone()));
                    } else {
                        downloads.push(SyncAction::StartDownload(item.clone()));
                    }
                }
                Some(local) => {
                    // During initial sync a name match alone schedules the
                    // update: the preservation pass has already renamed
                    // the local copy aside.
                    let cloud_newer = if self.initial_sync {
                        true
                    } else {
                        local.modified_at < item.modified_at
                    };
                    if cloud_newer {
                        if item.is_downloaded {
                            updates.push(SyncAction::UpdateLocal(item.clone()));
                        } else {
                            downloads.push(SyncAction::StartDownload(item.clone()));
                        }
                    }
                }
            }
        }

        self.cloud = new_cloud;
        actions.extend(downloads);
        actions.extend(removals);
        actions.extend(creations);
        actions.extend(updates);
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::CloudError;
    use crate::domain::item::{CloudItem, LocalItem};

    const EPUB: &str = "application/epub+zip";

    fn local(name: &str, modified_at: i64) -> LocalItem {
        LocalItem::new(name, format!("/docs/{name}"), EPUB, 0, modified_at)
    }

    fn cloud(name: &str, modified_at: i64) -> CloudItem {
        CloudItem::new(name, format!("/container/{name}"), EPUB, 0, modified_at)
    }

    fn local_set(items: &[(&str, i64)]) -> LocalSet {
        items.iter().map(|(n, m)| local(n, *m)).collect()
    }

    fn cloud_set(items: Vec<CloudItem>) -> CloudSet {
        items.into_iter().collect()
    }

    /// Drives both gathering events and returns the second batch.
    fn gather(reconciler: &mut Reconciler, local: LocalSet, cloud: CloudSet) -> Vec<SyncAction> {
        let first = reconciler.resolve(WatcherEvent::CloudGatheringFinished(cloud));
        assert!(first.is_empty(), "first gathering event must be quiescent");
        reconciler.resolve(WatcherEvent::LocalGatheringFinished(local))
    }

    fn names(actions: &[SyncAction], kind: &str) -> Vec<String> {
        actions
            .iter()
            .filter(|a| a.kind() == kind)
            .filter_map(|a| a.item_name().map(str::to_string))
            .collect()
    }

    // ------------------------------------------------------------------
    // Quiescence
    // ------------------------------------------------------------------

    #[test]
    fn test_gathering_is_quiescent_until_both_sides_report() {
        let mut reconciler = Reconciler::new(false);
        let out = reconciler.resolve(WatcherEvent::CloudGatheringFinished(cloud_set(vec![
            cloud("a.epub", 1),
        ])));
        assert!(out.is_empty());

        // The completing event triggers the reconciliation.
        let out = reconciler.resolve(WatcherEvent::LocalGatheringFinished(LocalSet::new()));
        assert_eq!(out, vec![SyncAction::CreateLocal(cloud("a.epub", 1))]);
    }

    #[test]
    fn test_updates_run_before_gathering_completes() {
        let mut reconciler = Reconciler::new(false);
        // Only the cloud side has gathered; a local update still diffs.
        reconciler.resolve(WatcherEvent::CloudGatheringFinished(CloudSet::new()));
        let out = reconciler.resolve(WatcherEvent::LocalUpdated(local_set(&[("a.epub", 1)])));
        assert_eq!(out, vec![SyncAction::CreateCloud(local("a.epub", 1))]);
    }

    // ------------------------------------------------------------------
    // Concrete scenarios
    // ------------------------------------------------------------------

    #[test]
    fn test_both_empty_at_first_sync() {
        let mut reconciler = Reconciler::new(true);
        let out = gather(&mut reconciler, LocalSet::new(), CloudSet::new());
        assert_eq!(out, vec![SyncAction::InitialSyncFinished]);
        assert!(!reconciler.is_initial_sync());
    }

    #[test]
    fn test_local_only_population() {
        let mut reconciler = Reconciler::new(true);
        let out = gather(
            &mut reconciler,
            local_set(&[("a.epub", 1), ("b.epub", 2), ("c.epub", 3)]),
            CloudSet::new(),
        );
        assert_eq!(
            out,
            vec![
                SyncAction::CreateCloud(local("a.epub", 1)),
                SyncAction::CreateCloud(local("b.epub", 2)),
                SyncAction::CreateCloud(local("c.epub", 3)),
                SyncAction::InitialSyncFinished,
            ]
        );
    }

    #[test]
    fn test_cloud_only_all_trashed_recreates_nothing() {
        let mut reconciler = Reconciler::new(true);
        let out = gather(
            &mut reconciler,
            LocalSet::new(),
            cloud_set(vec![
                cloud("a.epub", 1).in_trash(),
                cloud("b.epub", 2).in_trash(),
                cloud("c.epub", 3).in_trash(),
            ]),
        );
        assert_eq!(out, vec![SyncAction::InitialSyncFinished]);
    }

    #[test]
    fn test_mixed_newer_each_side() {
        let mut reconciler = Reconciler::new(false);
        let out = gather(
            &mut reconciler,
            local_set(&[("f1", 1), ("f2", 3), ("f3", 3), ("f4", 1)]),
            cloud_set(vec![
                cloud("f1", 4),
                cloud("f2", 2),
                cloud("f3", 7).in_trash(),
            ]),
        );

        assert_eq!(out.len(), 4);
        assert_eq!(names(&out, "update_local"), vec!["f1"]);
        assert_eq!(names(&out, "remove_local"), vec!["f3"]);
        assert_eq!(names(&out, "create_cloud"), vec!["f4"]);
        assert_eq!(names(&out, "update_cloud"), vec!["f2"]);
    }

    #[test]
    fn test_two_phase_download() {
        let mut reconciler = Reconciler::new(false);
        let steady = gather(
            &mut reconciler,
            local_set(&[("a.epub", 1)]),
            cloud_set(vec![cloud("a.epub", 1)]),
        );
        assert!(steady.is_empty());

        // Metadata advertises the item before its bytes are present.
        let out = reconciler.resolve(WatcherEvent::CloudUpdated(cloud_set(vec![
            cloud("a.epub", 1),
            cloud("b.epub", 3).not_downloaded(),
        ])));
        assert_eq!(
            out,
            vec![SyncAction::StartDownload(cloud("b.epub", 3).not_downloaded())]
        );

        // Once materialized, the item graduates to a concrete write.
        let out = reconciler.resolve(WatcherEvent::CloudUpdated(cloud_set(vec![
            cloud("a.epub", 1),
            cloud("b.epub", 3),
        ])));
        assert_eq!(out, vec![SyncAction::CreateLocal(cloud("b.epub", 3))]);
    }

    #[test]
    fn test_unresolved_conflict_short_circuits_updates() {
        let mut reconciler = Reconciler::new(false);
        gather(
            &mut reconciler,
            local_set(&[("a.epub", 1)]),
            cloud_set(vec![cloud("a.epub", 1)]),
        );

        let out = reconciler.resolve(WatcherEvent::CloudUpdated(cloud_set(vec![
            cloud("a.epub", 5).with_unresolved_conflicts(),
            cloud("b.epub", 2),
        ])));
        assert_eq!(
            out,
            vec![SyncAction::ResolveVersionsConflict(
                cloud("a.epub", 5).with_unresolved_conflicts()
            )]
        );

        // The snapshot was not committed: re-delivering the resolved set
        // still sees b.epub as new.
        let out = reconciler.resolve(WatcherEvent::CloudUpdated(cloud_set(vec![
            cloud("a.epub", 5),
            cloud("b.epub", 2),
        ])));
        assert_eq!(names(&out, "create_local"), vec!["b.epub"]);
        assert_eq!(names(&out, "update_local"), vec!["a.epub"]);
    }

    // ------------------------------------------------------------------
    // Universal properties
    // ------------------------------------------------------------------

    #[test]
    fn test_determinism_same_events_same_output() {
        let events = || {
            vec![
                WatcherEvent::CloudGatheringFinished(cloud_set(vec![
                    cloud("a.epub", 4),
                    cloud("b.epub", 1).in_trash(),
                ])),
                WatcherEvent::LocalGatheringFinished(local_set(&[("a.epub", 2), ("b.epub", 1)])),
                WatcherEvent::LocalUpdated(local_set(&[("a.epub", 9)])),
            ]
        };

        let mut first = Reconciler::new(true);
        let mut second = Reconciler::new(true);
        let out_first: Vec<Vec<SyncAction>> =
            events().into_iter().map(|e| first.resolve(e)).collect();
        let out_second: Vec<Vec<SyncAction>> =
            events().into_iter().map(|e| second.resolve(e)).collect();
        assert_eq!(out_first, out_second);
    }

    #[test]
    fn test_steady_state_is_idempotent() {
        let mut reconciler = Reconciler::new(false);
        let local = local_set(&[("a.epub", 1), ("b.epub", 2)]);
        let cloud_snapshot = cloud_set(vec![cloud("a.epub", 1), cloud("b.epub", 2)]);
        let out = gather(&mut reconciler, local.clone(), cloud_snapshot.clone());
        assert!(out.is_empty());

        assert!(reconciler
            .resolve(WatcherEvent::LocalUpdated(local))
            .is_empty());
        assert!(reconciler
            .resolve(WatcherEvent::CloudUpdated(cloud_snapshot))
            .is_empty());
    }

    #[test]
    fn test_initial_sync_finishes_exactly_once() {
        let mut reconciler = Reconciler::new(true);
        let out = gather(
            &mut reconciler,
            local_set(&[("a.epub", 1)]),
            CloudSet::new(),
        );
        let finishes = out
            .iter()
            .filter(|a| **a == SyncAction::InitialSyncFinished)
            .count();
        assert_eq!(finishes, 1);
        assert!(!reconciler.is_initial_sync());

        // A re-gathering does not finish again.
        let out = reconciler.resolve(WatcherEvent::LocalGatheringFinished(local_set(&[(
            "a.epub", 1,
        )])));
        assert!(!out.contains(&SyncAction::InitialSyncFinished));
    }

    #[test]
    fn test_trash_dominance_trash_wins_on_equal_timestamps() {
        let mut reconciler = Reconciler::new(false);
        let out = gather(
            &mut reconciler,
            local_set(&[("a.epub", 3)]),
            cloud_set(vec![cloud("a.epub", 3).in_trash()]),
        );
        // The delete happened at least as late as the local write.
        assert_eq!(names(&out, "remove_local"), vec!["a.epub"]);
    }

    #[test]
    fn test_trash_dominance_live_item_supersedes_trash() {
        let mut reconciler = Reconciler::new(false);
        let out = gather(
            &mut reconciler,
            local_set(&[("a.epub", 3)]),
            cloud_set(vec![cloud("a.epub", 5), cloud("a.epub", 3).in_trash()]),
        );
        // The live item is strictly newer than the trashed one: the trash
        // entry is ignored and the live content updates the local copy.
        assert!(names(&out, "remove_local").is_empty());
        assert_eq!(names(&out, "update_local"), vec!["a.epub"]);
    }

    #[test]
    fn test_trash_older_than_local_is_ignored() {
        let mut reconciler = Reconciler::new(false);
        let out = gather(
            &mut reconciler,
            local_set(&[("a.epub", 5)]),
            cloud_set(vec![cloud("a.epub", 3).in_trash()]),
        );
        // The local document outlived the delete; it goes back up.
        assert!(names(&out, "remove_local").is_empty());
        assert_eq!(names(&out, "create_cloud"), vec!["a.epub"]);
    }

    #[test]
    fn test_not_downloaded_trash_entry_removes_nothing() {
        let mut reconciler = Reconciler::new(false);
        let out = gather(
            &mut reconciler,
            local_set(&[("a.epub", 1)]),
            cloud_set(vec![cloud("a.epub", 4).in_trash().not_downloaded()]),
        );
        assert!(out.is_empty());
    }

    // ------------------------------------------------------------------
    // Initial-sync merge
    // ------------------------------------------------------------------

    #[test]
    fn test_initial_merge_preserves_overlapping_local_copies() {
        let mut reconciler = Reconciler::new(true);
        let out = gather(
            &mut reconciler,
            local_set(&[("a.epub", 9), ("b.epub", 1)]),
            cloud_set(vec![cloud("a.epub", 2)]),
        );

        // The overlapping name is preserved first, then the cloud copy
        // lands regardless of timestamps, then the cloud-only upload runs.
        assert_eq!(
            out.first(),
            Some(&SyncAction::PreserveLocalCopy(local("a.epub", 9)))
        );
        assert_eq!(names(&out, "update_local"), vec!["a.epub"]);
        assert_eq!(names(&out, "create_cloud"), vec!["b.epub"]);
        // The local copy is newer, but the cloud version must not be
        // overwritten before the preservation rename has run.
        assert!(names(&out, "update_cloud").is_empty());
        assert_eq!(out.last(), Some(&SyncAction::InitialSyncFinished));
    }

    // ------------------------------------------------------------------
    // Incremental diffs
    // ------------------------------------------------------------------

    #[test]
    fn test_local_removal_propagates_to_cloud() {
        let mut reconciler = Reconciler::new(false);
        gather(
            &mut reconciler,
            local_set(&[("a.epub", 1), ("b.epub", 2)]),
            cloud_set(vec![cloud("a.epub", 1), cloud("b.epub", 2)]),
        );

        let out = reconciler.resolve(WatcherEvent::LocalUpdated(local_set(&[("a.epub", 1)])));
        assert_eq!(out, vec![SyncAction::RemoveCloud(local("b.epub", 2))]);

        // The snapshot committed: repeating the set is quiescent.
        let out = reconciler.resolve(WatcherEvent::LocalUpdated(local_set(&[("a.epub", 1)])));
        assert!(out.is_empty());
    }

    #[test]
    fn test_local_create_blocked_by_newer_trash_entry() {
        let mut reconciler = Reconciler::new(false);
        gather(
            &mut reconciler,
            LocalSet::new(),
            cloud_set(vec![cloud("a.epub", 5).in_trash()]),
        );

        // A stale local copy re-appearing must not resurrect the deleted
        // document.
        let out = reconciler.resolve(WatcherEvent::LocalUpdated(local_set(&[("a.epub", 4)])));
        assert!(out.is_empty());

        // A strictly newer local write does go up.
        let out = reconciler.resolve(WatcherEvent::LocalUpdated(local_set(&[("a.epub", 6)])));
        assert_eq!(names(&out, "create_cloud"), vec!["a.epub"]);
    }

    #[test]
    fn test_cloud_errors_are_reported_and_diff_continues() {
        let mut reconciler = Reconciler::new(false);
        gather(&mut reconciler, LocalSet::new(), CloudSet::new());

        let mut unavailable = cloud("a.epub", 1);
        unavailable.downloading_error = Some(CloudError::ItemUnavailable);
        let out = reconciler.resolve(WatcherEvent::CloudUpdated(cloud_set(vec![
            unavailable.clone(),
            cloud("b.epub", 2),
        ])));

        assert_eq!(
            out.first(),
            Some(&SyncAction::ReportError(SyncError::FileUnavailable {
                name: "a.epub".into()
            }))
        );
        // Errors do not halt the diff; both items still land locally.
        assert_eq!(names(&out, "create_local"), vec!["a.epub", "b.epub"]);
    }

    #[test]
    fn test_download_start_precedes_removals_and_creations() {
        let mut reconciler = Reconciler::new(false);
        gather(
            &mut reconciler,
            local_set(&[("old.epub", 1)]),
            cloud_set(vec![cloud("old.epub", 1)]),
        );

        let out = reconciler.resolve(WatcherEvent::CloudUpdated(cloud_set(vec![
            cloud("new.epub", 9).not_downloaded(),
            cloud("old.epub", 2).in_trash(),
            cloud("ready.epub", 5),
        ])));
        assert_eq!(
            out,
            vec![
                SyncAction::StartDownload(cloud("new.epub", 9).not_downloaded()),
                SyncAction::RemoveLocal(cloud("old.epub", 2).in_trash()),
                SyncAction::CreateLocal(cloud("ready.epub", 5)),
            ]
        );
    }

    #[test]
    fn test_reset_clears_state_and_restores_initial_flag() {
        let mut reconciler = Reconciler::new(true);
        gather(
            &mut reconciler,
            local_set(&[("a.epub", 1)]),
            CloudSet::new(),
        );
        assert!(!reconciler.is_initial_sync());

        reconciler.reset();
        assert!(reconciler.is_initial_sync());

        // Gathering starts over from scratch.
        let out = reconciler.resolve(WatcherEvent::CloudGatheringFinished(CloudSet::new()));
        assert!(out.is_empty());
        let out = reconciler.resolve(WatcherEvent::LocalGatheringFinished(LocalSet::new()));
        assert_eq!(out, vec![SyncAction::InitialSyncFinished]);
    }
}
