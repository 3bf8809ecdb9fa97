//! Error types for the staging crate.

use sfpr_types::SubmissionId;

use crate::state::SubmissionState;

/// Errors that can occur while staging or resolving submissions.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// No staged submission with this id.
    #[error("submission not found: {0}")]
    NotFound(SubmissionId),

    /// The lifecycle does not allow this move.
    #[error("submission {id}: cannot move from {from} to {to}")]
    InvalidTransition {
        id: SubmissionId,
        from: SubmissionState,
        to: SubmissionState,
    },

    /// Metadata conflicts are only approved through adjudication.
    #[error("submission {0} is a metadata conflict and must be adjudicated")]
    RequiresAdjudication(SubmissionId),

    /// Adjudication was requested for a submission that is not in conflict.
    #[error("submission {0} is not a pending metadata conflict")]
    NotInConflict(SubmissionId),

    /// Content store failure while writing the blob.
    #[error("store error: {0}")]
    Store(#[from] sfpr_store::StoreError),

    /// The deduplication index disagreed with the staging area.
    #[error("dedup index error: {0}")]
    Dedup(#[from] sfpr_dedup::DedupError),

    /// Journal I/O failed.
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A journal entry could not be encoded or decoded.
    #[error("journal serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal lock was poisoned.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Convenience alias for staging results.
pub type StagingResult<T> = Result<T, StagingError>;
