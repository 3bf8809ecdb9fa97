use crate::classify::RecordRef;

/// Errors that can occur during index maintenance.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DedupError {
    /// The referenced record is not in the index.
    #[error("record not indexed: {0}")]
    UnknownRecord(RecordRef),

    /// A record with this reference is already indexed under other content.
    #[error("record {0} already indexed with a different digest or key")]
    Inconsistent(RecordRef),
}

/// Convenience alias for index results.
pub type DedupResult<T> = Result<T, DedupError>;
