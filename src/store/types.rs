//! Error type for the persistence seam.

/// Why a store operation failed.
///
/// Unlike position failures, store failures are infrastructure problems the
/// user cannot fix by moving outdoors, so they propagate as hard errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store failed (disk, database, platform storage API).
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A persisted record could not be encoded or decoded.
    #[error("record codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
