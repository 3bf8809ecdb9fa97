//! Maintainer decisions on staged submissions.
//!
//! Metadata conflicts are never resolved implicitly. A conflicting
//! submission stays in `Classified(MetadataConflict)` until someone calls
//! [`ConflictResolver::adjudicate`].

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sfpr_dedup::RecordRef;
use sfpr_types::{DeviceKey, Digest, SubmissionId};

use crate::area::{Inner, StagingArea};
use crate::error::{StagingError, StagingResult};
use crate::state::{ClassKind, SubmissionState};
use crate::submission::Submission;

/// A maintainer's ruling on a metadata conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjudication {
    /// The new submission replaces the record it conflicts with.
    Supersede,
    /// The new submission is discarded.
    Reject,
}

impl std::str::FromStr for Adjudication {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "supersede" => Ok(Self::Supersede),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown adjudication '{other}', expected supersede or reject")),
        }
    }
}

/// One side of a conflict.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub reference: RecordRef,
    pub digest: Digest,
    /// Lifecycle state for staged entries; absent for published records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<SubmissionState>,
    pub confirmations: u64,
}

/// Every live record of one device key that needs a decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub key: DeviceKey,
    pub entries: Vec<ConflictEntry>,
    /// Submissions waiting on [`ConflictResolver::adjudicate`].
    pub pending: Vec<SubmissionId>,
}

/// Approves, rejects and adjudicates staged submissions.
#[derive(Clone)]
pub struct ConflictResolver {
    staging: Arc<StagingArea>,
}

impl ConflictResolver {
    pub fn new(staging: Arc<StagingArea>) -> Self {
        Self { staging }
    }

    /// Approve a `New` submission for the next publish.
    pub fn approve(&self, id: &SubmissionId, actor: Option<&str>) -> StagingResult<Submission> {
        let mut inner = self.staging.write()?;
        let submission = inner.submission_mut(id)?;
        if submission.state == SubmissionState::Classified(ClassKind::MetadataConflict) {
            return Err(StagingError::RequiresAdjudication(*id));
        }
        let before = submission.clone();
        submission.transition(SubmissionState::Approved, actor, None)?;
        if let Err(err) = inner.persist(id, self.staging.journal()) {
            inner.submissions.insert(*id, before);
            return Err(err);
        }
        tracing::info!(submission = %id, actor = actor.unwrap_or("-"), "submission approved");
        inner.submissions.get(id).cloned().ok_or(StagingError::NotFound(*id))
    }

    /// Reject a submission that has not been approved yet.
    pub fn reject(
        &self,
        id: &SubmissionId,
        actor: Option<&str>,
        reason: &str,
    ) -> StagingResult<Submission> {
        let mut inner = self.staging.write()?;
        inner.reject(id, actor, reason, self.staging.journal())?;
        inner.submissions.get(id).cloned().ok_or(StagingError::NotFound(*id))
    }

    /// Settle a pending metadata conflict.
    ///
    /// `Supersede` approves the submission, points its `supersedes` at the
    /// live published record of the same device key (if there is one), and
    /// rejects every other staged submission of that key. It fails without
    /// changing anything if one of those is already approved; publish first.
    pub fn adjudicate(
        &self,
        id: &SubmissionId,
        ruling: Adjudication,
        actor: Option<&str>,
        reason: Option<&str>,
    ) -> StagingResult<Submission> {
        let journal = self.staging.journal();
        let mut inner = self.staging.write()?;
        let submission = inner.submission_mut(id)?;
        if submission.state != SubmissionState::Classified(ClassKind::MetadataConflict) {
            return Err(StagingError::NotInConflict(*id));
        }
        let key = submission.device_key();

        match ruling {
            Adjudication::Reject => {
                let reason = reason.unwrap_or("conflict rejected by adjudication");
                inner.reject(id, actor, reason, journal)?;
            }
            Adjudication::Supersede => {
                let rivals: Vec<RecordRef> = inner
                    .dedup
                    .records_for_key(&key)
                    .into_iter()
                    .filter(|r| *r != RecordRef::Staged(*id))
                    .collect();
                let staged_rivals: Vec<SubmissionId> =
                    rivals.iter().filter_map(RecordRef::as_submission).collect();
                check_rejectable(&inner, &staged_rivals)?;

                let mut published = rivals.iter().filter_map(RecordRef::as_module);
                let supersedes = published.next();
                if published.next().is_some() {
                    tracing::warn!(device = %key, "several published records live for one key; superseding the first");
                }

                let submission = inner.submission_mut(id)?;
                let before = submission.clone();
                submission.transition(SubmissionState::Approved, actor, reason)?;
                submission.supersedes = supersedes;
                if let Err(err) = inner.persist(id, journal) {
                    inner.submissions.insert(*id, before);
                    return Err(err);
                }

                if let Some(old) = supersedes {
                    inner.retire_superseded(old)?;
                }

                let note = format!("superseded by submission {id}");
                for rival in staged_rivals {
                    inner.reject(&rival, actor, &note, journal)?;
                }
                tracing::info!(
                    submission = %id,
                    device = %key,
                    supersedes = ?supersedes,
                    "conflict resolved by supersession"
                );
            }
        }

        inner.submissions.get(id).cloned().ok_or(StagingError::NotFound(*id))
    }

    /// Every device key with more than one live digest, plus every key with
    /// a conflict submission still waiting on a decision.
    pub fn conflicts(&self) -> StagingResult<Vec<ConflictReport>> {
        let inner = self.staging.read()?;

        let mut keys: BTreeSet<DeviceKey> = inner.dedup.conflicting_keys().into_iter().collect();
        keys.extend(
            inner
                .submissions
                .values()
                .filter(|s| s.state == SubmissionState::Classified(ClassKind::MetadataConflict))
                .map(Submission::device_key),
        );

        let reports = keys
            .into_iter()
            .map(|key| {
                let entries = inner
                    .dedup
                    .records_for_key(&key)
                    .into_iter()
                    .filter_map(|reference| {
                        let digest = inner.dedup.digest_of(&reference)?;
                        let state = reference
                            .as_submission()
                            .and_then(|id| inner.submissions.get(&id))
                            .map(|s| s.state);
                        Some(ConflictEntry {
                            reference,
                            digest,
                            state,
                            confirmations: inner.confirmations(&reference),
                        })
                    })
                    .collect();
                let pending = entries_pending(&inner, &key);
                ConflictReport {
                    key,
                    entries,
                    pending,
                }
            })
            .collect();
        Ok(reports)
    }
}

fn entries_pending(inner: &Inner, key: &DeviceKey) -> Vec<SubmissionId> {
    inner
        .submissions
        .values()
        .filter(|s| s.state == SubmissionState::Classified(ClassKind::MetadataConflict))
        .filter(|s| s.device_key() == *key)
        .map(|s| s.id)
        .collect()
}

fn check_rejectable(inner: &Inner, ids: &[SubmissionId]) -> StagingResult<()> {
    for id in ids {
        let Some(s) = inner.submissions.get(id) else {
            continue;
        };
        if !s.state.can_transition_to(&SubmissionState::Rejected) {
            return Err(StagingError::InvalidTransition {
                id: *id,
                from: s.state,
                to: SubmissionState::Rejected,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::{Intake, IntakeOutcome, IntakeRequest};
    use crate::policy::ApprovalPolicy;
    use serde_json::json;
    use sfpr_store::{ContentStore, InMemoryContentStore};
    use sfpr_types::{ModuleId, ModuleRecord};
    use sfpr_validate::{Validator, ValidatorConfig};

    struct Fixture {
        intake: Intake,
        resolver: ConflictResolver,
        staging: Arc<StagingArea>,
    }

    fn fixture(published: &[ModuleRecord], policy: ApprovalPolicy) -> Fixture {
        let store: Arc<dyn ContentStore> = Arc::new(InMemoryContentStore::new());
        let staging = Arc::new(
            StagingArea::open(Arc::new(crate::journal::InMemoryJournal::new()), published)
                .unwrap(),
        );
        Fixture {
            intake: Intake::new(
                Validator::with_default_stages(ValidatorConfig::default()),
                store,
                staging.clone(),
                policy,
            ),
            resolver: ConflictResolver::new(staging.clone()),
            staging,
        }
    }

    fn submit(f: &Fixture, serial: &str, fill: u8) -> IntakeOutcome {
        let meta = json!({
            "name": "10G LR",
            "vendor": "FLEXOPTIX",
            "model": "P.1396.10",
            "serial": serial,
        });
        f.intake
            .submit(IntakeRequest::new(meta, vec![fill; 256]))
            .unwrap()
            .outcome
    }

    fn staged_id(outcome: &IntakeOutcome) -> SubmissionId {
        match outcome {
            IntakeOutcome::Queued { submission, .. } | IntakeOutcome::Conflict { submission, .. } => {
                *submission
            }
            other => panic!("not staged: {other:?}"),
        }
    }

    fn published_record(serial: &str, fill: u8) -> ModuleRecord {
        let digest = Digest::of(&vec![fill; 256]);
        ModuleRecord {
            id: ModuleId::new(),
            name: "10G LR".into(),
            vendor: "FLEXOPTIX".into(),
            model: "P.1396.10".into(),
            serial: serial.into(),
            sha256: digest,
            size: 256,
            blob_url: digest.blob_file_name(),
            submitted_by: "seed".into(),
            created_at: chrono::Utc::now(),
            notes: None,
            supersedes: None,
        }
    }

    #[test]
    fn approve_new_submission() {
        let f = fixture(&[], ApprovalPolicy::default());
        let id = staged_id(&submit(&f, "S1", 1));
        let approved = f.resolver.approve(&id, Some("maint")).unwrap();
        assert_eq!(approved.state, SubmissionState::Approved);
        assert_eq!(f.staging.approved().unwrap().len(), 1);
    }

    #[test]
    fn conflict_cannot_be_approved_directly() {
        let f = fixture(&[], ApprovalPolicy::unattended());
        submit(&f, "S1", 1);
        let id = staged_id(&submit(&f, "S1", 2));
        assert!(matches!(
            f.resolver.approve(&id, None),
            Err(StagingError::RequiresAdjudication(_))
        ));
        assert!(f.staging.approved().unwrap().iter().all(|s| s.id != id));
    }

    #[test]
    fn approved_submission_cannot_be_rejected() {
        let f = fixture(&[], ApprovalPolicy::unattended());
        let id = staged_id(&submit(&f, "S1", 1));
        let err = f.resolver.reject(&id, None, "changed my mind").unwrap_err();
        assert!(matches!(err, StagingError::InvalidTransition { .. }));
    }

    #[test]
    fn adjudicate_requires_conflict() {
        let f = fixture(&[], ApprovalPolicy::default());
        let id = staged_id(&submit(&f, "S1", 1));
        assert!(matches!(
            f.resolver.adjudicate(&id, Adjudication::Supersede, None, None),
            Err(StagingError::NotInConflict(_))
        ));
    }

    #[test]
    fn supersede_published_record() {
        let old = published_record("S1", 1);
        let f = fixture(std::slice::from_ref(&old), ApprovalPolicy::default());
        let outcome = submit(&f, "S1", 2);
        let IntakeOutcome::Conflict { submission, existing } = outcome else {
            panic!("expected conflict");
        };
        assert_eq!(existing, RecordRef::Published(old.id));

        let resolved = f
            .resolver
            .adjudicate(&submission, Adjudication::Supersede, Some("maint"), Some("corrected dump"))
            .unwrap();
        assert_eq!(resolved.state, SubmissionState::Approved);
        assert_eq!(resolved.supersedes, Some(old.id));
        assert!(f.resolver.conflicts().unwrap().is_empty());

        // The superseded blob is no longer the live record for its key.
        let again = submit(&f, "S1", 1);
        assert!(matches!(
            again,
            IntakeOutcome::Conflict { existing: RecordRef::Staged(by), .. } if by == submission
        ));
    }

    #[test]
    fn supersede_rejects_staged_rival() {
        let f = fixture(&[], ApprovalPolicy::default());
        let first = staged_id(&submit(&f, "S1", 1));
        let second = staged_id(&submit(&f, "S1", 2));

        let resolved = f
            .resolver
            .adjudicate(&second, Adjudication::Supersede, None, None)
            .unwrap();
        assert_eq!(resolved.supersedes, None);
        let rival = f.staging.get(&first).unwrap();
        assert_eq!(rival.state, SubmissionState::Rejected);
        assert!(rival.rejection_reason().unwrap().contains("superseded"));
        assert!(f.resolver.conflicts().unwrap().is_empty());
    }

    #[test]
    fn supersede_blocked_by_approved_rival() {
        let f = fixture(&[], ApprovalPolicy::unattended());
        let first = staged_id(&submit(&f, "S1", 1));
        let second = staged_id(&submit(&f, "S1", 2));

        let err = f
            .resolver
            .adjudicate(&second, Adjudication::Supersede, None, None)
            .unwrap_err();
        assert!(matches!(err, StagingError::InvalidTransition { id, .. } if id == first));
        assert_eq!(
            f.staging.get(&second).unwrap().state,
            SubmissionState::Classified(ClassKind::MetadataConflict)
        );
    }

    #[test]
    fn adjudicated_rejection() {
        let f = fixture(&[], ApprovalPolicy::default());
        submit(&f, "S1", 1);
        let second = staged_id(&submit(&f, "S1", 2));

        let rejected = f
            .resolver
            .adjudicate(&second, Adjudication::Reject, Some("maint"), None)
            .unwrap();
        assert_eq!(rejected.state, SubmissionState::Rejected);
        assert!(f.resolver.conflicts().unwrap().is_empty());
    }

    #[test]
    fn conflict_report_lists_both_sides() {
        let old = published_record("S1", 1);
        let f = fixture(std::slice::from_ref(&old), ApprovalPolicy::default());
        let id = staged_id(&submit(&f, "S1", 2));

        let reports = f.resolver.conflicts().unwrap();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.key, old.device_key());
        assert_eq!(report.pending, vec![id]);
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.entries[0].reference, RecordRef::Published(old.id));
        assert_eq!(report.entries[0].state, None);
        assert_eq!(
            report.entries[1].state,
            Some(SubmissionState::Classified(ClassKind::MetadataConflict))
        );
    }

    #[test]
    fn conflicts_inside_published_index_are_reported() {
        let a = published_record("S9", 1);
        let b = published_record("S9", 2);
        let f = fixture(&[a, b], ApprovalPolicy::default());
        let reports = f.resolver.conflicts().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].pending.is_empty());
    }

    #[test]
    fn adjudication_parses() {
        assert_eq!("supersede".parse::<Adjudication>(), Ok(Adjudication::Supersede));
        assert!("merge".parse::<Adjudication>().is_err());
    }
}
