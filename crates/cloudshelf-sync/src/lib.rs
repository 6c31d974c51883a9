//! CloudShelf Sync - orchestration layer for the cloud synchronization
//! subsystem
//!
//! Provides:
//! - [`engine::SyncEngine`]: the serialized work lane pumping watcher
//!   observations through the Reconciler and dispatching I/O
//! - The notify-based local documents watcher
//! - The polling cloud metadata watcher
//! - Coordinated I/O workers against both stores
//! - YAML-backed durable sync state and logging setup

pub mod cloud_watcher;
pub mod engine;
pub mod local_watcher;
pub mod logging;
pub mod state;
pub mod workers;

pub use engine::{EngineDeps, SyncEngine};
