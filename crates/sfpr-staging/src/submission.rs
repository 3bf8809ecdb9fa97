use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sfpr_dedup::{Classification, RecordRef};
use sfpr_types::{DeviceKey, Digest, ModuleId, SubmissionId, SubmissionMetadata};
use sfpr_validate::ValidationIssue;

use crate::error::{StagingError, StagingResult};
use crate::state::{ClassKind, SubmissionState};

/// One recorded lifecycle step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: SubmissionState,
    pub to: SubmissionState,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A candidate module record moving through staging.
///
/// The blob itself lives in the content store; a submission refers to it
/// by digest only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub metadata: SubmissionMetadata,
    pub digest: Digest,
    pub size: u64,
    pub submitted_by: String,
    /// First acceptance into staging. Becomes the record's `created_at`.
    pub created_at: DateTime<Utc>,
    pub state: SubmissionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    /// Byte-identical re-submissions seen while staged.
    #[serde(default)]
    pub confirmations: u64,
    /// Published record this submission replaces once published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<ModuleId>,
    /// Assigned when the submission first enters a publish batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<ModuleId>,
    /// Advisory findings from validation, kept for reviewers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ValidationIssue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Transition>,
}

impl Submission {
    /// A freshly received submission.
    pub fn received(
        metadata: SubmissionMetadata,
        digest: Digest,
        size: u64,
        submitted_by: impl Into<String>,
    ) -> Self {
        Self {
            id: SubmissionId::new(),
            metadata,
            digest,
            size,
            submitted_by: submitted_by.into(),
            created_at: Utc::now(),
            state: SubmissionState::Received,
            classification: None,
            confirmations: 0,
            supersedes: None,
            module_id: None,
            warnings: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn device_key(&self) -> DeviceKey {
        self.metadata.device_key()
    }

    pub fn reference(&self) -> RecordRef {
        RecordRef::Staged(self.id)
    }

    /// Move to `next`, recording the step in the history.
    pub fn transition(
        &mut self,
        next: SubmissionState,
        actor: Option<&str>,
        reason: Option<&str>,
    ) -> StagingResult<()> {
        if !self.state.can_transition_to(&next) {
            return Err(StagingError::InvalidTransition {
                id: self.id,
                from: self.state,
                to: next,
            });
        }
        self.history.push(Transition {
            from: self.state,
            to: next,
            at: Utc::now(),
            actor: actor.map(str::to_string),
            reason: reason.map(str::to_string),
        });
        self.state = next;
        Ok(())
    }

    /// Record the dedup outcome and move to `Classified`.
    pub fn classify(&mut self, classification: Classification) -> StagingResult<()> {
        self.transition(
            SubmissionState::Classified(ClassKind::from(&classification)),
            None,
            None,
        )?;
        self.classification = Some(classification);
        Ok(())
    }

    /// The reason given for the most recent rejection, if rejected.
    pub fn rejection_reason(&self) -> Option<&str> {
        if self.state != SubmissionState::Rejected {
            return None;
        }
        self.history
            .iter()
            .rev()
            .find(|t| t.to == SubmissionState::Rejected)
            .and_then(|t| t.reason.as_deref())
    }
}
