use sfpr_types::Digest;

use crate::result::{IssueKind, ValidationIssue};
use crate::stage::{StageDecision, ValidationContext, ValidationStage};

/// Digest stage.
///
/// Computes the blob's SHA-256 and, when the submitter declared one,
/// requires the two to match. The declared value is compared
/// case-insensitively.
pub struct DigestStage;

impl ValidationStage for DigestStage {
    fn name(&self) -> &str {
        "digest"
    }

    fn evaluate(&self, context: &mut ValidationContext<'_>) -> StageDecision {
        let computed = Digest::of(context.blob);
        context.digest = Some(computed);

        let Some(declared) = context.metadata.as_ref().and_then(|m| m.sha256.as_deref()) else {
            return StageDecision::Pass;
        };
        match Digest::from_hex(&declared.to_ascii_lowercase()) {
            Ok(d) if d == computed => StageDecision::Pass,
            Ok(d) => StageDecision::fail(ValidationIssue::for_field(
                IssueKind::DigestMismatch,
                "sha256",
                format!("declared sha256 {d} does not match computed {computed}"),
            )),
            Err(e) => StageDecision::fail(ValidationIssue::for_field(
                IssueKind::DigestMismatch,
                "sha256",
                format!("declared sha256 is not a valid digest: {e}"),
            )),
        }
    }
}
