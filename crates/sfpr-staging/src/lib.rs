//! Staging area for the SFP module registry.
//!
//! Everything between "a submitter sent bytes" and "the publisher may take
//! this" lives here:
//!
//! - [`Intake`] validates a submission, stores its blob, classifies it
//!   against the [`sfpr_dedup::DedupIndex`], and stages it.
//! - [`Submission`] carries the lifecycle [`SubmissionState`] and its
//!   audit history.
//! - [`ConflictResolver`] exposes the maintainer decisions: approve, reject,
//!   and adjudication of metadata conflicts.
//! - [`Journal`] persists staged submissions so they survive restarts.
//!
//! Staged submissions are owned by the [`StagingArea`] until the publisher
//! commits them; after that the published `ModuleRecord` is authoritative
//! and the submission is retired.

pub mod area;
pub mod error;
pub mod intake;
pub mod journal;
pub mod policy;
pub mod resolver;
pub mod state;
pub mod submission;

pub use area::StagingArea;
pub use error::{StagingError, StagingResult};
pub use intake::{Intake, IntakeOutcome, IntakeReceipt, IntakeRequest};
pub use journal::{FsJournal, InMemoryJournal, Journal};
pub use policy::ApprovalPolicy;
pub use resolver::{Adjudication, ConflictEntry, ConflictReport, ConflictResolver};
pub use state::{ClassKind, SubmissionState};
pub use submission::{Submission, Transition};
