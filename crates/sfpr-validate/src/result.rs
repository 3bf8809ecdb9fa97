use serde::{Deserialize, Serialize};
use sfpr_types::{Digest, SubmissionMetadata};

/// Category of a validation finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Metadata is malformed: missing fields, wrong types, bad lengths.
    SchemaError,
    /// Blob size lies outside the configured bounds.
    SizeOutOfRange,
    /// The declared digest disagrees with the computed one.
    DigestMismatch,
    /// A metadata field the schema does not know.
    UnknownField,
    /// The image's embedded identity disagrees with the metadata.
    IdentityMismatch,
    /// The image is all 0x00 or all 0xFF.
    BlankImage,
}

/// A single finding produced by a stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: None,
            message: message.into(),
        }
    }

    pub fn for_field(kind: IssueKind, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

/// The outcome of validating one submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub accepted: bool,
    /// Hard failures, in the order they were found.
    pub errors: Vec<ValidationIssue>,
    /// Advisory findings, in the order they were found.
    pub warnings: Vec<ValidationIssue>,
    /// Parsed metadata, present once the schema stage has passed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SubmissionMetadata>,
    /// Digest of the blob, present once the digest stage has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
    pub size: u64,
}

impl ValidationResult {
    /// Returns `true` if any error has the given kind.
    pub fn has_error(&self, kind: IssueKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    /// Returns `true` if any warning has the given kind.
    pub fn has_warning(&self, kind: IssueKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }
}
