//! High-level API for the SFP module registry.
//!
//! [`Registry`] wires the content store, validator, staging area, conflict
//! resolver and publisher together according to a [`RegistryConfig`]. It
//! is the entry point for the HTTP server, the CLI, and anything else
//! embedding the registry.
//!
//! ```rust
//! use sfpr_registry::{Registry, RegistryConfig};
//! use sfpr_staging::{IntakeOutcome, IntakeRequest};
//!
//! let mut config = RegistryConfig::default();
//! config.policy.auto_approve_new = true;
//! let registry = Registry::in_memory(config).unwrap();
//!
//! let metadata = serde_json::json!({
//!     "name": "Cisco DAC 1m",
//!     "vendor": "CISCO-OEM",
//!     "model": "SFP-H10GB-CU1M",
//!     "serial": "ABC123",
//! });
//! let receipt = registry.submit(IntakeRequest::new(metadata, vec![0x03; 256])).unwrap();
//! assert!(matches!(receipt.outcome, IntakeOutcome::Queued { .. }));
//!
//! let report = registry.publish().unwrap();
//! assert_eq!(report.version, 1);
//! ```

pub mod config;
pub mod error;
pub mod lock;
pub mod registry;

pub use config::{PublishConfig, RegistryConfig, ServerConfig};
pub use error::{RegistryError, RegistryResult};
pub use lock::DataDirLock;
pub use registry::{FsckReport, Registry, RegistryStats};

pub use sfpr_dedup::{Classification, RecordRef};
pub use sfpr_publish::{IndexSnapshot, PublishReport, PublishedEntry};
pub use sfpr_staging::{
    Adjudication, ConflictReport, IntakeOutcome, IntakeReceipt, IntakeRequest, Submission,
    SubmissionState,
};
pub use sfpr_types::{Digest, ModuleId, ModuleRecord, SubmissionId};
pub use sfpr_validate::{ValidationResult, ValidatorConfig};
