//! The submission lifecycle.
//!
//! ```text
//! Received -> Validated -> Classified{New|ExactDuplicate|MetadataConflict} -> Approved -> Published
//!     \            \              \
//!      +------------+--------------+--> Rejected
//! ```
//!
//! `Published` and `Rejected` are terminal.

use std::fmt;

use serde::{Deserialize, Serialize};
use sfpr_dedup::Classification;

/// Classification outcome without the referenced record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    New,
    ExactDuplicate,
    MetadataConflict,
}

impl From<&Classification> for ClassKind {
    fn from(c: &Classification) -> Self {
        match c {
            Classification::New => Self::New,
            Classification::ExactDuplicate(_) => Self::ExactDuplicate,
            Classification::MetadataConflict(_) => Self::MetadataConflict,
        }
    }
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::ExactDuplicate => write!(f, "exact_duplicate"),
            Self::MetadataConflict => write!(f, "metadata_conflict"),
        }
    }
}

/// Where a submission is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "class", rename_all = "snake_case")]
pub enum SubmissionState {
    Received,
    Validated,
    Classified(ClassKind),
    Approved,
    Published,
    Rejected,
}

impl SubmissionState {
    /// Returns `true` for `Published` and `Rejected`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Published | Self::Rejected)
    }

    /// Returns `true` while the submission still takes part in deduplication.
    pub fn is_live(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns `true` if a maintainer decision is outstanding.
    pub fn awaits_review(&self) -> bool {
        matches!(
            self,
            Self::Classified(ClassKind::New) | Self::Classified(ClassKind::MetadataConflict)
        )
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: &SubmissionState) -> bool {
        use SubmissionState::*;
        match (self, next) {
            (Received, Validated) => true,
            (Validated, Classified(_)) => true,
            (Classified(_), Approved) => true,
            (Approved, Published) => true,
            (Received | Validated | Classified(_), Rejected) => true,
            _ => false,
        }
    }

    /// Short lowercase label, used in logs and the CLI.
    pub fn label(&self) -> String {
        match self {
            Self::Received => "received".into(),
            Self::Validated => "validated".into(),
            Self::Classified(kind) => kind.to_string(),
            Self::Approved => "approved".into(),
            Self::Published => "published".into(),
            Self::Rejected => "rejected".into(),
        }
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classified(kind) => write!(f, "classified({kind})"),
            other => write!(f, "{}", other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SubmissionState::*;

    #[test]
    fn forward_path() {
        let path = [
            Received,
            Validated,
            Classified(ClassKind::New),
            Approved,
            Published,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(&pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn rejection_sources() {
        assert!(Received.can_transition_to(&Rejected));
        assert!(Validated.can_transition_to(&Rejected));
        assert!(Classified(ClassKind::MetadataConflict).can_transition_to(&Rejected));
        assert!(!Approved.can_transition_to(&Rejected));
        assert!(!Published.can_transition_to(&Rejected));
    }

    #[test]
    fn no_skipping_and_no_leaving_terminal_states() {
        assert!(!Received.can_transition_to(&Approved));
        assert!(!Validated.can_transition_to(&Published));
        assert!(!Classified(ClassKind::New).can_transition_to(&Published));
        assert!(!Rejected.can_transition_to(&Validated));
        assert!(!Published.can_transition_to(&Approved));
    }

    #[test]
    fn terminal_states() {
        assert!(Published.is_terminal());
        assert!(Rejected.is_terminal());
        assert!(Approved.is_live());
        assert!(Classified(ClassKind::MetadataConflict).awaits_review());
        assert!(!Classified(ClassKind::ExactDuplicate).awaits_review());
    }

    #[test]
    fn serialized_form() {
        let json = serde_json::to_value(Classified(ClassKind::MetadataConflict)).unwrap();
        assert_eq!(json["state"], "classified");
        assert_eq!(json["class"], "metadata_conflict");
        let json = serde_json::to_value(Approved).unwrap();
        assert_eq!(json["state"], "approved");
        assert_eq!(Classified(ClassKind::New).label(), "new");
    }
}
