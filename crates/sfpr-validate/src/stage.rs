use serde_json::Value;
use sfpr_types::{Digest, SubmissionMetadata};

use crate::config::ValidatorConfig;
use crate::result::ValidationIssue;

/// How a stage's failure is treated by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// A failure rejects the submission and stops the pipeline.
    Structural,
    /// The stage only records warnings and never rejects.
    Advisory,
}

/// The outcome of a single stage evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageDecision {
    /// The stage passed; proceed to the next stage.
    Pass,
    /// The stage failed with one or more issues.
    Fail { issues: Vec<ValidationIssue> },
}

impl StageDecision {
    /// Fail with a single issue.
    pub fn fail(issue: ValidationIssue) -> Self {
        Self::Fail {
            issues: vec![issue],
        }
    }

    /// Returns `true` if the decision is `Pass`.
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// State shared by all stages while one submission is evaluated.
///
/// Earlier stages fill in `metadata` and `digest` for later ones.
pub struct ValidationContext<'a> {
    pub raw_metadata: &'a Value,
    pub blob: &'a [u8],
    pub config: &'a ValidatorConfig,
    pub metadata: Option<SubmissionMetadata>,
    pub digest: Option<Digest>,
    pub warnings: Vec<ValidationIssue>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(raw_metadata: &'a Value, blob: &'a [u8], config: &'a ValidatorConfig) -> Self {
        Self {
            raw_metadata,
            blob,
            config,
            metadata: None,
            digest: None,
            warnings: Vec::new(),
        }
    }

    /// Record an advisory finding.
    pub fn warn(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }
}

/// A single evaluation stage in the validation pipeline.
///
/// The trait is object-safe and `Send + Sync` so stages can be stored in
/// a `Vec<Box<dyn ValidationStage>>`.
pub trait ValidationStage: Send + Sync {
    /// Human-readable name of this stage (e.g., "schema", "size").
    fn name(&self) -> &str;

    /// Whether a failure of this stage rejects the submission.
    fn severity(&self) -> Severity {
        Severity::Structural
    }

    /// Evaluate the submission.
    fn evaluate(&self, context: &mut ValidationContext<'_>) -> StageDecision;
}
