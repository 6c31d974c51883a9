//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! synchronization core. Ports are interfaces that the core depends on,
//! but whose implementations live in adapter code (the sync crate or the
//! embedding application).
//!
//! ## Ports Overview
//!
//! - [`DirectoryWatcher`] - Lifecycle of the two side-observing watchers
//! - [`CloudMetadataSource`] - The host's cloud metadata query adapter
//! - [`CloudStore`] - Container resolution, downloads, version collapse
//! - [`BookmarkLoader`] - Downstream reload hook after local writes
//! - [`SyncStateStore`] - Durable record of the first completed sync
//! - [`BackgroundActivity`] - Finite background-execution grants

pub mod activity;
pub mod bookmarks;
pub mod cloud;
pub mod state;
pub mod watchers;

pub use activity::{BackgroundActivity, BackgroundGrant, UnlimitedActivity};
pub use bookmarks::BookmarkLoader;
pub use cloud::{CloudMetadataSource, CloudStore, ItemVersion};
pub use state::SyncStateStore;
pub use watchers::{DirectoryWatcher, WatcherReport};
