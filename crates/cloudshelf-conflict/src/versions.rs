//! Concurrent-version selection
//!
//! When two devices write divergent versions of the same document, the
//! cloud layer advertises the item as conflicted until the history is
//! collapsed. The policy here is fixed: the version with the latest
//! modification date wins; the losing current content is preserved under
//! a new name by the executor before it is replaced.

use cloudshelf_core::ports::cloud::ItemVersion;

use crate::error::ConflictError;

/// Picks the version that wins a concurrent-edit conflict: the one with
/// the latest modification date. Ties resolve to the earliest enumerated
/// version, which by convention is the current one.
pub fn latest_version(versions: &[ItemVersion]) -> Result<&ItemVersion, ConflictError> {
    versions
        .iter()
        .reduce(|best, candidate| {
            if candidate.modified_at > best.modified_at {
                candidate
            } else {
                best
            }
        })
        .ok_or(ConflictError::NoVersions)
}
