use std::fmt;

use sfpr_types::Digest;

/// Errors from content store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No blob is stored under this digest.
    #[error("blob not found: {0}")]
    NotFound(Digest),

    /// The bytes stored under a digest hash to something else.
    #[error("integrity violation for {expected}: content hashes to {computed}")]
    DigestMismatch { expected: Digest, computed: Digest },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A problem found by a full store scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntegrityIssue {
    /// An entry whose name is not `<lowercase sha256>.bin`.
    BadName(String),
    /// An entry whose content does not hash to its name.
    DigestMismatch { expected: Digest, computed: Digest },
    /// A leftover temporary file from an interrupted write.
    StrayTemp(String),
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadName(name) => write!(f, "unexpected entry name: {name}"),
            Self::DigestMismatch { expected, computed } => {
                write!(f, "{expected}.bin hashes to {computed}")
            }
            Self::StrayTemp(name) => write!(f, "stray temporary file: {name}"),
        }
    }
}
