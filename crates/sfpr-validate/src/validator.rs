use std::time::Instant;

use serde_json::Value;
use tracing::{debug, trace};

use crate::config::ValidatorConfig;
use crate::result::ValidationResult;
use crate::stage::{Severity, StageDecision, ValidationContext, ValidationStage};
use crate::stages::{DigestStage, IdentityStage, SchemaStage, SizeStage};

/// The submission validator: a configurable pipeline of stages.
///
/// The validator is a pure decision function. It never touches storage.
pub struct Validator {
    stages: Vec<Box<dyn ValidationStage>>,
    config: ValidatorConfig,
}

impl Validator {
    /// Create a validator with an empty pipeline.
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            stages: Vec::new(),
            config,
        }
    }

    /// Create a validator with the default pipeline:
    /// Schema -> Size -> Digest -> Identity
    pub fn with_default_stages(config: ValidatorConfig) -> Self {
        let mut validator = Self::new(config);
        validator.add_stage(Box::new(SchemaStage));
        validator.add_stage(Box::new(SizeStage));
        validator.add_stage(Box::new(DigestStage));
        validator.add_stage(Box::new(IdentityStage));
        validator
    }

    /// Append a stage to the end of the pipeline.
    pub fn add_stage(&mut self, stage: Box<dyn ValidationStage>) {
        self.stages.push(stage);
    }

    /// The current configuration.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Number of stages in the pipeline.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Validate one submission.
    ///
    /// Structural stages stop the pipeline on their first failure. Advisory
    /// stages run only after every structural stage has passed, and their
    /// findings are always downgraded to warnings.
    pub fn validate(&self, metadata: &Value, blob: &[u8]) -> ValidationResult {
        let pipeline_start = Instant::now();
        let mut context = ValidationContext::new(metadata, blob, &self.config);
        let mut errors = Vec::new();

        let structural = self
            .stages
            .iter()
            .filter(|s| s.severity() == Severity::Structural);
        for stage in structural {
            let stage_start = Instant::now();
            let decision = stage.evaluate(&mut context);
            trace!(stage = stage.name(), elapsed = ?stage_start.elapsed(), "stage evaluated");
            if let StageDecision::Fail { issues } = decision {
                debug!(stage = stage.name(), issues = issues.len(), "submission rejected");
                errors = issues;
                break;
            }
        }

        if errors.is_empty() {
            let advisory = self
                .stages
                .iter()
                .filter(|s| s.severity() == Severity::Advisory);
            for stage in advisory {
                if let StageDecision::Fail { issues } = stage.evaluate(&mut context) {
                    context.warnings.extend(issues);
                }
            }
        }

        trace!(elapsed = ?pipeline_start.elapsed(), "validation finished");
        ValidationResult {
            accepted: errors.is_empty(),
            errors,
            warnings: context.warnings,
            metadata: context.metadata,
            digest: context.digest,
            size: blob.len() as u64,
        }
    }
}
