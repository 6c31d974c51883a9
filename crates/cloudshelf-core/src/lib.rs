//! CloudShelf Core - Domain logic for the cloud synchronization subsystem
//!
//! This crate contains the hexagonal architecture core with:
//! - Domain value types (LocalItem, CloudItem, per-side snapshots)
//! - The event vocabulary (WatcherEvent, SyncAction)
//! - The Reconciler state machine
//! - The synchronization error taxonomy
//! - Port definitions (traits for adapters)

pub mod config;
pub mod domain;
pub mod ports;
