//! Synchronization error taxonomy
//!
//! [`CloudError`] is the raw per-item error vocabulary the cloud metadata
//! layer attaches to snapshot items. [`SyncError`] is the taxonomy the
//! rest of the subsystem reasons about: the Reconciler maps raw item
//! errors into it, I/O workers produce it, and the engine's fatality
//! classification decides whether synchronization continues or stops.
//!
//! Errors never mutate the Reconciler's snapshots; recovery always
//! happens through the next gathering or update event.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw per-item error reported by the cloud metadata layer.
///
/// These mirror the error codes the host's ubiquity layer attaches to
/// individual items in a metadata snapshot, decoupled from any platform
/// error type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudError {
    /// The item's bytes cannot be fetched yet (a peer device has not
    /// finished uploading them).
    ItemUnavailable,
    /// The account is out of space.
    QuotaExceeded,
    /// The ubiquity transport is unreachable.
    ServerUnavailable,
    /// The user has no cloud identity (signed out).
    NoAccount,
    /// The application's cloud container cannot be resolved.
    ContainerMissing,
    /// Anything else the cloud layer reports.
    Other(String),
}

/// Errors surfaced by the synchronization subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// A cloud item's bytes cannot be fetched; the peer has not uploaded
    /// them yet. Per-item and transient.
    #[error("cloud item '{name}' is not yet available for download")]
    FileUnavailable { name: String },

    /// The account is out of space; nothing further can be uploaded this
    /// session.
    #[error("cloud item '{name}' was not uploaded: account quota exceeded")]
    FileNotUploadedDueToQuota { name: String },

    /// Transport failure talking to the ubiquity server. Transient; the
    /// next snapshot retries implicitly.
    #[error("ubiquity server is not available")]
    UbiquityServerNotAvailable,

    /// The user has no cloud identity.
    #[error("cloud storage is not available for this user")]
    CloudUnavailable,

    /// The application's cloud container cannot be resolved.
    #[error("cloud container could not be resolved")]
    ContainerNotFound,

    /// Catch-all for coordinator errors, I/O failures, and metadata
    /// decoding errors. Per-item.
    #[error("internal synchronization error: {0}")]
    Internal(String),
}

impl SyncError {
    /// True when the error ends the synchronization session. Everything
    /// else is logged per-item and recovered via the next snapshot.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::FileNotUploadedDueToQuota { .. }
                | SyncError::CloudUnavailable
                | SyncError::ContainerNotFound
        )
    }

    /// Maps a raw per-item cloud error into the taxonomy.
    pub fn from_cloud(name: &str, error: &CloudError) -> Self {
        match error {
            CloudError::ItemUnavailable => SyncError::FileUnavailable {
                name: name.to_string(),
            },
            CloudError::QuotaExceeded => SyncError::FileNotUploadedDueToQuota {
                name: name.to_string(),
            },
            CloudError::ServerUnavailable => SyncError::UbiquityServerNotAvailable,
            CloudError::NoAccount => SyncError::CloudUnavailable,
            CloudError::ContainerMissing => SyncError::ContainerNotFound,
            CloudError::Other(detail) => SyncError::Internal(format!("{name}: {detail}")),
        }
    }

    /// Wraps an adapter failure into the per-item catch-all.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        SyncError::Internal(detail.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SyncError::FileNotUploadedDueToQuota {
            name: "a.epub".into()
        }
        .is_fatal());
        assert!(SyncError::CloudUnavailable.is_fatal());
        assert!(SyncError::ContainerNotFound.is_fatal());

        assert!(!SyncError::FileUnavailable {
            name: "a.epub".into()
        }
        .is_fatal());
        assert!(!SyncError::UbiquityServerNotAvailable.is_fatal());
        assert!(!SyncError::Internal("io".into()).is_fatal());
    }

    #[test]
    fn test_from_cloud_mapping() {
        assert_eq!(
            SyncError::from_cloud("a.epub", &CloudError::ItemUnavailable),
            SyncError::FileUnavailable {
                name: "a.epub".into()
            }
        );
        assert_eq!(
            SyncError::from_cloud("a.epub", &CloudError::QuotaExceeded),
            SyncError::FileNotUploadedDueToQuota {
                name: "a.epub".into()
            }
        );
        assert_eq!(
            SyncError::from_cloud("a.epub", &CloudError::ServerUnavailable),
            SyncError::UbiquityServerNotAvailable
        );
        assert_eq!(
            SyncError::from_cloud("a.epub", &CloudError::NoAccount),
            SyncError::CloudUnavailable
        );
        assert_eq!(
            SyncError::from_cloud("a.epub", &CloudError::ContainerMissing),
            SyncError::ContainerNotFound
        );
    }

    #[test]
    fn test_from_cloud_other_keeps_detail() {
        let err = SyncError::from_cloud("a.epub", &CloudError::Other("decode failed".into()));
        assert_eq!(
            err,
            SyncError::Internal("a.epub: decode failed".to_string())
        );
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::FileUnavailable {
            name: "report.epub".into(),
        };
        assert_eq!(
            err.to_string(),
            "cloud item 'report.epub' is not yet available for download"
        );
        assert_eq!(
            SyncError::ContainerNotFound.to_string(),
            "cloud container could not be resolved"
        );
    }
}
