//! Foundation types for the SFP module registry.
//!
//! This crate provides the identity and record types shared by every stage
//! of the submission pipeline. Every other `sfpr-*` crate depends on
//! `sfpr-types`.
//!
//! # Key Types
//!
//! - [`Digest`]: SHA-256 content address of an EEPROM blob
//! - [`ModuleId`] / [`SubmissionId`]: UUID v7 identifiers
//! - [`DeviceKey`]: the `(vendor, model, serial)` identity triple
//! - [`ModuleRecord`]: a published registry entry
//! - [`SubmissionMetadata`]: submitter-provided metadata after schema checks
//! - [`EepromIdentity`]: vendor/model/serial embedded in an SFF-8472 image

pub mod device;
pub mod digest;
pub mod eeprom;
pub mod error;
pub mod id;
pub mod metadata;
pub mod record;

pub use device::DeviceKey;
pub use digest::Digest;
pub use eeprom::{is_blank_image, EepromIdentity, FieldMismatch};
pub use error::TypeError;
pub use id::{ModuleId, SubmissionId};
pub use metadata::SubmissionMetadata;
pub use record::ModuleRecord;
