use crate::result::{IssueKind, ValidationIssue};
use crate::stage::{StageDecision, ValidationContext, ValidationStage};

/// Blob size stage: the image must lie within the configured inclusive bounds.
pub struct SizeStage;

impl ValidationStage for SizeStage {
    fn name(&self) -> &str {
        "size"
    }

    fn evaluate(&self, context: &mut ValidationContext<'_>) -> StageDecision {
        let size = context.blob.len();
        let (min, max) = (context.config.min_size, context.config.max_size);
        if size < min || size > max {
            return StageDecision::fail(ValidationIssue::new(
                IssueKind::SizeOutOfRange,
                format!("blob is {size} bytes; expected {min}..={max}"),
            ));
        }
        StageDecision::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidatorConfig;
    use serde_json::Value;

    fn decide(len: usize) -> StageDecision {
        let config = ValidatorConfig::default();
        let blob = vec![0u8; len];
        let meta = Value::Null;
        let mut ctx = ValidationContext::new(&meta, &blob, &config);
        SizeStage.evaluate(&mut ctx)
    }

    #[test]
    fn boundaries() {
        assert!(!decide(127).is_pass());
        assert!(decide(128).is_pass());
        assert!(decide(512).is_pass());
        assert!(!decide(513).is_pass());
        assert!(!decide(0).is_pass());
    }
}
