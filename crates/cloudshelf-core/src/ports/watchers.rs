//! Directory watcher port (driven/secondary port)
//!
//! Both sides of the sync are observed by a watcher: the local documents
//! directory and the ubiquitous cloud container. A watcher reports one
//! gathering-finished event per start, then update events for every
//! coalesced change burst, all through a single channel into the engine's
//! serialized work lane.
//!
//! ## Design Notes
//!
//! - Watchers notify the engine through the channel sender they receive
//!   at start; they hold no reference back to the engine, which owns
//!   them.
//! - Monitor errors (including availability changes on the cloud side)
//!   travel the same channel as [`WatcherReport::Error`] so the lane
//!   imposes a total order on everything it processes.
//! - `pause` drops change bursts without tearing the watch down;
//!   `resume` re-arms it and catches up on changes made in between.

use tokio::sync::mpsc;

use crate::domain::errors::SyncError;
use crate::domain::event::WatcherEvent;

/// What a watcher delivers to the engine: an observation or a monitor
/// error for the engine to classify.
#[derive(Debug, Clone, PartialEq)]
pub enum WatcherReport {
    Event(WatcherEvent),
    Error(SyncError),
}

/// Port trait for the two side-observing watchers.
///
/// ## Contract
///
/// - `start` performs the initial enumeration and sends exactly one
///   gathering-finished event before returning `Ok`. Subsequent change
///   bursts arrive as update events until `stop`.
/// - `start` failures are surfaced to the caller; the engine treats a
///   local watcher start failure as a fatal stop.
/// - `stop` tears the watch down; a later `start` begins a fresh
///   gathering cycle.
#[async_trait::async_trait]
pub trait DirectoryWatcher: Send {
    /// Starts observing, delivering reports through `reports`.
    async fn start(&mut self, reports: mpsc::Sender<WatcherReport>) -> Result<(), SyncError>;

    /// Temporarily stops delivering reports without tearing down the
    /// underlying watch.
    async fn pause(&mut self);

    /// Resumes delivery after [`pause`](Self::pause), catching up on
    /// changes made while paused.
    async fn resume(&mut self);

    /// Stops observing and releases watch resources.
    async fn stop(&mut self);
}
