use std::fmt;

use serde::{Deserialize, Serialize};
use sfpr_types::{ModuleId, SubmissionId};

/// A reference to something the index knows about.
///
/// Published records order before staged submissions, so when several
/// entries match, the published one is reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RecordRef {
    Published(ModuleId),
    Staged(SubmissionId),
}

impl RecordRef {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published(_))
    }

    pub fn as_module(&self) -> Option<ModuleId> {
        match self {
            Self::Published(id) => Some(*id),
            Self::Staged(_) => None,
        }
    }

    pub fn as_submission(&self) -> Option<SubmissionId> {
        match self {
            Self::Staged(id) => Some(*id),
            Self::Published(_) => None,
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Published(id) => write!(f, "module:{id}"),
            Self::Staged(id) => write!(f, "submission:{id}"),
        }
    }
}

/// How an incoming `(digest, device key)` pair relates to what is indexed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class", content = "existing", rename_all = "snake_case")]
pub enum Classification {
    /// Nothing indexed shares this device key.
    New,
    /// Same digest under the same device key: no new information.
    ExactDuplicate(RecordRef),
    /// Same device key, different digest. Needs adjudication.
    MetadataConflict(RecordRef),
}

impl Classification {
    pub fn is_new(&self) -> bool {
        matches!(self, Self::New)
    }

    /// The existing record this classification points at, if any.
    pub fn existing(&self) -> Option<RecordRef> {
        match self {
            Self::New => None,
            Self::ExactDuplicate(r) | Self::MetadataConflict(r) => Some(*r),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::ExactDuplicate(r) => write!(f, "exact duplicate of {r}"),
            Self::MetadataConflict(r) => write!(f, "metadata conflict with {r}"),
        }
    }
}
