//! Submission intake.
//!
//! Validation and the blob write happen outside the staging lock; only the
//! classify-and-stage step is serialized. Intake never waits on a
//! maintainer: conflicts are staged and reported as pending review.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sfpr_dedup::{Classification, RecordRef};
use sfpr_store::ContentStore;
use sfpr_types::{Digest, SubmissionId};
use sfpr_validate::{ValidationResult, Validator};

use crate::area::StagingArea;
use crate::error::StagingResult;
use crate::policy::ApprovalPolicy;
use crate::state::SubmissionState;
use crate::submission::Submission;

/// Label used when a submission carries no submitter.
pub const ANONYMOUS: &str = "anonymous";

/// One metadata document plus one raw EEPROM image.
#[derive(Clone, Debug)]
pub struct IntakeRequest {
    /// Unvalidated metadata as received.
    pub metadata: Value,
    pub blob: Vec<u8>,
    /// Transport-level submitter label. Falls back to the metadata's
    /// `submitted_by` field.
    pub submitted_by: Option<String>,
}

impl IntakeRequest {
    pub fn new(metadata: Value, blob: impl Into<Vec<u8>>) -> Self {
        Self {
            metadata,
            blob: blob.into(),
            submitted_by: None,
        }
    }

    pub fn submitted_by(mut self, label: impl Into<String>) -> Self {
        self.submitted_by = Some(label.into());
        self
    }
}

/// What intake did with a submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IntakeOutcome {
    /// Staged as new; `state` is `Classified(New)` or `Approved`.
    Queued {
        submission: SubmissionId,
        state: SubmissionState,
    },
    /// Byte-identical to a known record. Nothing was staged.
    Duplicate {
        existing: RecordRef,
        confirmations: u64,
    },
    /// Staged, pending review against a record with the same identity.
    Conflict {
        submission: SubmissionId,
        existing: RecordRef,
    },
    /// Validation failed. Nothing was stored.
    Rejected,
}

/// The synchronous answer to a submitter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeReceipt {
    #[serde(flatten)]
    pub outcome: IntakeOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
    pub validation: ValidationResult,
}

impl IntakeReceipt {
    /// The identifier a submitter can refer back to, if any.
    pub fn reference(&self) -> Option<RecordRef> {
        match &self.outcome {
            IntakeOutcome::Queued { submission, .. } | IntakeOutcome::Conflict { submission, .. } => {
                Some(RecordRef::Staged(*submission))
            }
            IntakeOutcome::Duplicate { existing, .. } => Some(*existing),
            IntakeOutcome::Rejected => None,
        }
    }
}

/// Receives submissions and stages them.
pub struct Intake {
    validator: Validator,
    store: Arc<dyn ContentStore>,
    staging: Arc<StagingArea>,
    policy: ApprovalPolicy,
}

impl Intake {
    pub fn new(
        validator: Validator,
        store: Arc<dyn ContentStore>,
        staging: Arc<StagingArea>,
        policy: ApprovalPolicy,
    ) -> Self {
        Self {
            validator,
            store,
            staging,
            policy,
        }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn policy(&self) -> &ApprovalPolicy {
        &self.policy
    }

    /// Validate, store, classify and stage one submission.
    ///
    /// Validation failures are not errors: they come back as
    /// [`IntakeOutcome::Rejected`] with the itemized result. `Err` means the
    /// store or the journal failed, and the submission may be retried.
    pub fn submit(&self, request: IntakeRequest) -> StagingResult<IntakeReceipt> {
        let validation = self.validator.validate(&request.metadata, &request.blob);

        let accepted = match (validation.accepted, validation.metadata.clone(), validation.digest) {
            (true, Some(metadata), Some(digest)) => Some((metadata, digest)),
            _ => None,
        };
        let Some((metadata, digest)) = accepted else {
            tracing::info!(
                errors = validation.errors.len(),
                size = request.blob.len(),
                "submission rejected by validation"
            );
            return Ok(IntakeReceipt {
                outcome: IntakeOutcome::Rejected,
                digest: validation.digest,
                validation,
            });
        };

        let submitted_by = request
            .submitted_by
            .or_else(|| metadata.submitted_by.clone())
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| ANONYMOUS.to_string());

        let mut submission = Submission::received(
            metadata,
            digest,
            request.blob.len() as u64,
            submitted_by,
        );
        submission.warnings = validation.warnings.clone();
        submission.transition(SubmissionState::Validated, None, None)?;
        tracing::debug!(
            submission = %submission.id,
            digest = %digest.short_hex(),
            warnings = submission.warnings.len(),
            "submission validated"
        );

        self.store.put(&request.blob)?;

        let outcome = self.stage(submission)?;
        Ok(IntakeReceipt {
            outcome,
            digest: Some(digest),
            validation,
        })
    }

    fn stage(&self, mut submission: Submission) -> StagingResult<IntakeOutcome> {
        let journal = self.staging.journal();
        let mut inner = self.staging.write()?;

        let key = submission.device_key();
        let classification = inner.dedup.classify(&submission.digest, &key);
        submission.classify(classification)?;

        match classification {
            Classification::ExactDuplicate(existing) => {
                // Informational merge: approved as a no-op, then discarded.
                submission.transition(SubmissionState::Approved, None, Some("exact duplicate"))?;
                let confirmations = inner.confirm(existing, journal)?;
                tracing::info!(
                    %existing,
                    digest = %submission.digest.short_hex(),
                    confirmations,
                    "duplicate submission merged"
                );
                Ok(IntakeOutcome::Duplicate {
                    existing,
                    confirmations,
                })
            }
            Classification::MetadataConflict(existing) => {
                let id = submission.id;
                inner.stage(submission, journal)?;
                tracing::warn!(
                    submission = %id,
                    %existing,
                    device = %key,
                    "metadata conflict staged for review"
                );
                Ok(IntakeOutcome::Conflict {
                    submission: id,
                    existing,
                })
            }
            Classification::New => {
                if self.policy.auto_approve_new {
                    submission.transition(SubmissionState::Approved, Some("policy"), None)?;
                }
                let (id, state) = (submission.id, submission.state);
                inner.stage(submission, journal)?;
                tracing::info!(submission = %id, state = %state, device = %key, "submission queued");
                Ok(IntakeOutcome::Queued {
                    submission: id,
                    state,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ClassKind;
    use serde_json::json;
    use sfpr_store::InMemoryContentStore;
    use sfpr_validate::{IssueKind, ValidatorConfig};

    fn intake(policy: ApprovalPolicy) -> (Intake, Arc<dyn ContentStore>, Arc<StagingArea>) {
        let store: Arc<dyn ContentStore> = Arc::new(InMemoryContentStore::new());
        let staging = Arc::new(StagingArea::in_memory());
        let intake = Intake::new(
            Validator::with_default_stages(ValidatorConfig::default()),
            store.clone(),
            staging.clone(),
            policy,
        );
        (intake, store, staging)
    }

    fn metadata(serial: &str) -> Value {
        json!({
            "name": "Cisco DAC 1m",
            "vendor": "CISCO-OEM",
            "model": "SFP-H10GB-CU1M",
            "serial": serial,
        })
    }

    fn blob(fill: u8) -> Vec<u8> {
        vec![fill; 256]
    }

    #[test]
    fn new_submission_is_queued_and_stored() {
        let (intake, store, staging) = intake(ApprovalPolicy::default());
        let receipt = intake.submit(IntakeRequest::new(metadata("ABC123"), blob(1))).unwrap();

        let IntakeOutcome::Queued { submission, state } = receipt.outcome else {
            panic!("expected queued, got {:?}", receipt.outcome);
        };
        assert_eq!(state, SubmissionState::Classified(ClassKind::New));
        assert_eq!(receipt.digest, Some(Digest::of(&blob(1))));
        assert!(store.contains(&Digest::of(&blob(1))).unwrap());

        let staged = staging.get(&submission).unwrap();
        assert_eq!(staged.submitted_by, ANONYMOUS);
        assert_eq!(staged.size, 256);
        assert_eq!(staged.history.len(), 2);
    }

    #[test]
    fn unattended_policy_approves_new() {
        let (intake, _, staging) = intake(ApprovalPolicy::unattended());
        let receipt = intake.submit(IntakeRequest::new(metadata("ABC123"), blob(1))).unwrap();
        assert!(matches!(
            receipt.outcome,
            IntakeOutcome::Queued { state: SubmissionState::Approved, .. }
        ));
        assert_eq!(staging.approved().unwrap().len(), 1);
    }

    #[test]
    fn identical_resubmission_returns_same_reference() {
        let (intake, store, staging) = intake(ApprovalPolicy::default());
        let first = intake
            .submit(IntakeRequest::new(metadata("ABC123"), blob(1)).submitted_by("alice"))
            .unwrap();
        let second = intake
            .submit(IntakeRequest::new(metadata("ABC123"), blob(1)).submitted_by("bob"))
            .unwrap();

        assert_eq!(first.reference(), second.reference());
        assert!(matches!(
            second.outcome,
            IntakeOutcome::Duplicate { confirmations: 1, .. }
        ));
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(staging.list().unwrap().len(), 1);
    }

    #[test]
    fn different_blob_same_identity_conflicts() {
        let (intake, _, staging) = intake(ApprovalPolicy::unattended());
        let first = intake.submit(IntakeRequest::new(metadata("ABC123"), blob(1))).unwrap();
        let second = intake.submit(IntakeRequest::new(metadata("ABC123"), blob(2))).unwrap();

        let IntakeOutcome::Conflict { submission, existing } = second.outcome else {
            panic!("expected conflict, got {:?}", second.outcome);
        };
        assert_eq!(Some(existing), first.reference());
        let staged = staging.get(&submission).unwrap();
        assert_eq!(
            staged.state,
            SubmissionState::Classified(ClassKind::MetadataConflict)
        );
        assert_eq!(staging.approved().unwrap().len(), 1);
    }

    #[test]
    fn resubmitted_conflict_is_idempotent() {
        let (intake, _, staging) = intake(ApprovalPolicy::default());
        intake.submit(IntakeRequest::new(metadata("ABC123"), blob(1))).unwrap();
        let conflict = intake.submit(IntakeRequest::new(metadata("ABC123"), blob(2))).unwrap();
        let again = intake.submit(IntakeRequest::new(metadata("ABC123"), blob(2))).unwrap();

        assert_eq!(conflict.reference(), again.reference());
        assert_eq!(staging.list().unwrap().len(), 2);
    }

    #[test]
    fn invalid_submission_has_no_side_effects() {
        let (intake, store, staging) = intake(ApprovalPolicy::default());
        let receipt = intake
            .submit(IntakeRequest::new(metadata("ABC123"), vec![1u8; 127]))
            .unwrap();

        assert_eq!(receipt.outcome, IntakeOutcome::Rejected);
        assert!(receipt.validation.has_error(IssueKind::SizeOutOfRange));
        assert_eq!(receipt.reference(), None);
        assert!(store.is_empty().unwrap());
        assert!(staging.list().unwrap().is_empty());
    }

    #[test]
    fn submitter_falls_back_to_metadata() {
        let (intake, _, staging) = intake(ApprovalPolicy::default());
        let mut meta = metadata("ABC123");
        meta["submitted_by"] = json!("frank");
        let receipt = intake.submit(IntakeRequest::new(meta, blob(1))).unwrap();
        let Some(RecordRef::Staged(id)) = receipt.reference() else {
            panic!("expected staged reference");
        };
        assert_eq!(staging.get(&id).unwrap().submitted_by, "frank");
    }

    #[test]
    fn receipt_serializes_flat() {
        let (intake, _, _) = intake(ApprovalPolicy::default());
        let receipt = intake.submit(IntakeRequest::new(metadata("ABC123"), blob(1))).unwrap();
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["outcome"], "queued");
        assert_eq!(json["state"]["state"], "classified");
        assert_eq!(json["validation"]["accepted"], true);
    }
}
