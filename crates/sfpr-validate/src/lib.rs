//! Submission validator for the SFP module registry.
//!
//! Every submission passes through the validator before anything is written.
//! The validator runs a pipeline of stages and produces a
//! [`ValidationResult`]: an accept/reject decision plus itemized errors and
//! warnings. It has no side effects.
//!
//! Structural stages (schema, size, digest) are fail-fast: the first one
//! that fails ends the pipeline. Advisory stages only add warnings, and all
//! of them run once the structure is sound.
//!
//! # Quick Start
//!
//! ```rust
//! use sfpr_validate::{Validator, ValidatorConfig};
//!
//! let validator = Validator::with_default_stages(ValidatorConfig::default());
//! let metadata = serde_json::json!({
//!     "name": "Cisco DAC 1m",
//!     "vendor": "CISCO-OEM",
//!     "model": "SFP-H10GB-CU1M",
//!     "serial": "ABC123",
//! });
//! let result = validator.validate(&metadata, &[0u8; 256]);
//! assert!(result.accepted);
//! ```

pub mod config;
pub mod result;
pub mod stage;
pub mod stages;
pub mod validator;

pub use config::ValidatorConfig;
pub use result::{IssueKind, ValidationIssue, ValidationResult};
pub use stage::{Severity, StageDecision, ValidationContext, ValidationStage};
pub use stages::{DigestStage, IdentityStage, SchemaStage, SizeStage};
pub use validator::Validator;
