use sfpr_types::{is_blank_image, EepromIdentity};

use crate::result::{IssueKind, ValidationIssue};
use crate::stage::{Severity, StageDecision, ValidationContext, ValidationStage};

/// Advisory stage comparing the SFF-8472 identity embedded in the image with
/// the submitted metadata.
///
/// Findings are warnings: a module may legitimately be relabelled, but a
/// maintainer reviewing it should see the discrepancy.
pub struct IdentityStage;

impl ValidationStage for IdentityStage {
    fn name(&self) -> &str {
        "identity"
    }

    fn severity(&self) -> Severity {
        Severity::Advisory
    }

    fn evaluate(&self, context: &mut ValidationContext<'_>) -> StageDecision {
        if is_blank_image(context.blob) {
            context.warn(ValidationIssue::new(
                IssueKind::BlankImage,
                "image is blank (all 0x00 or all 0xFF)",
            ));
            return StageDecision::Pass;
        }
        if !context.config.check_eeprom_identity {
            return StageDecision::Pass;
        }
        let Some(declared) = context.metadata.as_ref().map(|m| m.device_key()) else {
            return StageDecision::Pass;
        };
        let Some(embedded) = EepromIdentity::parse(context.blob) else {
            return StageDecision::Pass;
        };
        for mismatch in embedded.mismatches(&declared) {
            context.warn(ValidationIssue::for_field(
                IssueKind::IdentityMismatch,
                mismatch.field,
                format!(
                    "image reports {} `{}` but metadata says `{}`",
                    mismatch.field, mismatch.embedded, mismatch.declared
                ),
            ));
        }
        StageDecision::Pass
    }
}
