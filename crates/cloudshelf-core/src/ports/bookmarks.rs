//! Downstream reload hook (driven/secondary port)

/// Port trait for the application's bookmark index reload.
///
/// Invoked after a sync batch changed local content, at most once per
/// batch; overlapping batches collapse to a single call. The call is
/// idempotent, takes no parameters and returns nothing. Implementations
/// that must run on a particular executor hop there themselves.
pub trait BookmarkLoader: Send + Sync {
    fn load_bookmarks(&self);
}
