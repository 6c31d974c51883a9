//! Error types for the conflict engine

use thiserror::Error;

/// Errors that can occur while collapsing concurrent versions
#[derive(Debug, Error)]
pub enum ConflictError {
    /// The version store enumerated no versions for the item
    #[error("item has no versions to resolve")]
    NoVersions,

    /// Resolution operation failed (copy, replace, or cleanup)
    #[error("resolution failed: {0}")]
    ResolutionFailed(String),
}
