//! Error types for the publish crate.

use sfpr_types::{Digest, SubmissionId};

/// Errors that can occur while loading or publishing an index.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The new snapshot could not be made visible. The previous index is
    /// untouched and the batch can be retried.
    #[error("index commit failed: {0}")]
    CommitFailed(String),

    /// A record refers to a blob the content store does not hold.
    #[error("blob missing from content store: {0}")]
    MissingBlob(Digest),

    /// Only approved submissions can be published.
    #[error("submission {0} is not approved")]
    NotApproved(SubmissionId),

    /// The visible index is not the predecessor of the snapshot being
    /// committed: someone else published in between.
    #[error("stale index: committing version {committing} over version {found}")]
    StaleIndex { committing: u64, found: u64 },

    /// A snapshot violates the index invariants.
    #[error("invalid index: {0}")]
    InvalidIndex(String),

    #[error("store error: {0}")]
    Store(#[from] sfpr_store::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Convenience alias for publish results.
pub type PublishResult<T> = Result<T, PublishError>;
