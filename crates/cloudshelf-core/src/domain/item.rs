//! Metadata items and per-side snapshot collections
//!
//! A [`LocalItem`] describes a document observed in the local documents
//! directory; a [`CloudItem`] describes a document observed in the
//! ubiquitous cloud container, including attributes only the cloud layer
//! knows about (download state, trash membership, unresolved conflicts,
//! per-item transfer errors). Both are plain record types sharing the
//! [`MetadataItem`] accessors.
//!
//! Snapshots ([`LocalSet`], [`CloudSet`]) are keyed by file name. The
//! cloud snapshot keeps two tiers because a name may exist both live and
//! in the trash at the same time, and the trash-dominance rules need to
//! see both entries.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::CloudError;

/// Truncates a wall-clock instant to whole seconds since the Unix epoch.
///
/// Cross-side timestamp comparisons happen at this resolution. The local
/// filesystem and the cloud metadata layer report different sub-second
/// precision; truncating both sides keeps a freshly synced pair of files
/// equal in time instead of bouncing updates back and forth.
pub fn truncate_to_seconds(time: SystemTime) -> i64 {
    DateTime::<Utc>::from(time).timestamp()
}

/// Shared accessors for a document observed on either side of the sync.
///
/// `LocalItem` and `CloudItem` are two concrete record types; this trait
/// covers the attributes they have in common so code that only needs the
/// shared surface can take either.
pub trait MetadataItem {
    /// File name including extension; the unique key within its side.
    fn name(&self) -> &str;
    /// Path handle for the item's bytes.
    fn url(&self) -> &Path;
    /// Byte count, absent when the item has not been stat'd yet.
    fn size(&self) -> Option<u64>;
    /// Media-type tag; filtered upstream to the single accepted type.
    fn content_type(&self) -> &str;
    /// Creation time in whole seconds since the epoch.
    fn created_at(&self) -> i64;
    /// Modification time in whole seconds since the epoch.
    fn modified_at(&self) -> i64;
}

/// A document observed in the local documents directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalItem {
    pub name: String,
    pub url: PathBuf,
    pub size: Option<u64>,
    pub content_type: String,
    /// Whole seconds since the epoch; see [`truncate_to_seconds`].
    pub created_at: i64,
    /// Whole seconds since the epoch; see [`truncate_to_seconds`].
    pub modified_at: i64,
}

impl LocalItem {
    /// Creates a local item from already-truncated timestamps.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<PathBuf>,
        content_type: impl Into<String>,
        created_at: i64,
        modified_at: i64,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            size: None,
            content_type: content_type.into(),
            created_at,
            modified_at,
        }
    }

    /// Sets the byte count.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

impl MetadataItem for LocalItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &Path {
        &self.url
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }

    fn modified_at(&self) -> i64 {
        self.modified_at
    }
}

/// A document observed in the ubiquitous cloud container.
///
/// Cloud metadata may advertise an item before its bytes are present
/// locally (`is_downloaded == false`); such items can be observed but not
/// copied until the store materializes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudItem {
    pub name: String,
    pub url: PathBuf,
    pub size: Option<u64>,
    pub content_type: String,
    /// Whole seconds since the epoch; see [`truncate_to_seconds`].
    pub created_at: i64,
    /// Whole seconds since the epoch; see [`truncate_to_seconds`].
    pub modified_at: i64,
    /// True iff the full byte content is materialized in the container.
    pub is_downloaded: bool,
    /// True iff the item's path lies under the container's trash directory.
    pub is_in_trash: bool,
    /// True iff the cloud layer is advertising more than one concurrent
    /// version of this item.
    pub has_unresolved_conflicts: bool,
    /// Per-item download error reported by the cloud layer, if any.
    pub downloading_error: Option<CloudError>,
    /// Per-item upload error reported by the cloud layer, if any.
    pub uploading_error: Option<CloudError>,
}

impl CloudItem {
    /// Creates a live, downloaded, conflict-free cloud item.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<PathBuf>,
        content_type: impl Into<String>,
        created_at: i64,
        modified_at: i64,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            size: None,
            content_type: content_type.into(),
            created_at,
            modified_at,
            is_downloaded: true,
            is_in_trash: false,
            has_unresolved_conflicts: false,
            downloading_error: None,
            uploading_error: None,
        }
    }

    /// Sets the byte count.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Marks the item's bytes as not yet materialized.
    pub fn not_downloaded(mut self) -> Self {
        self.is_downloaded = false;
        self
    }

    /// Marks the item as living under the trash directory.
    pub fn in_trash(mut self) -> Self {
        self.is_in_trash = true;
        self
    }

    /// Marks the item as carrying unresolved concurrent versions.
    pub fn with_unresolved_conflicts(mut self) -> Self {
        self.has_unresolved_conflicts = true;
        self
    }

    /// True when the cloud layer reported an error on either transfer
    /// direction for this item.
    pub fn has_transfer_error(&self) -> bool {
        self.downloading_error.is_some() || self.uploading_error.is_some()
    }
}

impl MetadataItem for CloudItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &Path {
        &self.url
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }

    fn modified_at(&self) -> i64 {
        self.modified_at
    }
}

/// Snapshot of the local documents directory, keyed by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSet {
    items: BTreeMap<String, LocalItem>,
}

impl LocalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an item, replacing any previous entry with the same name.
    pub fn insert(&mut self, item: LocalItem) -> Option<LocalItem> {
        self.items.insert(item.name.clone(), item)
    }

    pub fn get(&self, name: &str) -> Option<&LocalItem> {
        self.items.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates items in name order.
    pub fn iter(&self) -> impl Iterator<Item = &LocalItem> {
        self.items.values()
    }
}

impl FromIterator<LocalItem> for LocalSet {
    fn from_iter<T: IntoIterator<Item = LocalItem>>(iter: T) -> Self {
        let mut set = Self::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}

/// Snapshot of the ubiquitous cloud container, keyed by file name.
///
/// Holds two tiers: live items and trashed items. A deleted document and
/// its replacement may share a name across tiers, and the reconciliation
/// rules compare their timestamps to decide which one dictates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudSet {
    live: BTreeMap<String, CloudItem>,
    trashed: BTreeMap<String, CloudItem>,
}

impl CloudSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an item into the tier selected by its `is_in_trash` flag,
    /// replacing any previous same-tier entry with the same name.
    pub fn insert(&mut self, item: CloudItem) -> Option<CloudItem> {
        if item.is_in_trash {
            self.trashed.insert(item.name.clone(), item)
        } else {
            self.live.insert(item.name.clone(), item)
        }
    }

    /// Looks up a live (non-trashed) item by name.
    pub fn live(&self, name: &str) -> Option<&CloudItem> {
        self.live.get(name)
    }

    /// Looks up a trashed item by name.
    pub fn trashed(&self, name: &str) -> Option<&CloudItem> {
        self.trashed.get(name)
    }

    /// Iterates live items in name order.
    pub fn live_items(&self) -> impl Iterator<Item = &CloudItem> {
        self.live.values()
    }

    /// Iterates trashed items in name order.
    pub fn trashed_items(&self) -> impl Iterator<Item = &CloudItem> {
        self.trashed.values()
    }

    /// Iterates both tiers, live items first.
    pub fn all_items(&self) -> impl Iterator<Item = &CloudItem> {
        self.live.values().chain(self.trashed.values())
    }

    /// Total cardinality across both tiers.
    pub fn len(&self) -> usize {
        self.live.len() + self.trashed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty() && self.trashed.is_empty()
    }
}

impl FromIterator<CloudItem> for CloudSet {
    fn from_iter<T: IntoIterator<Item = CloudItem>>(iter: T) -> Self {
        let mut set = Self::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}
