//! Deduplication index for the SFP module registry.
//!
//! Answers one question for every incoming blob: is it new, an exact copy of
//! something already known, or a different blob claiming an identity that is
//! already taken? Both published records and staged submissions are
//! indexed, so duplicates are caught before they ever reach the publisher.
//!
//! Lookups go through two hash maps (by digest and by device key) and are
//! O(1) amortized in the size of the registry.

pub mod classify;
pub mod error;
pub mod index;

pub use classify::{Classification, RecordRef};
pub use error::{DedupError, DedupResult};
pub use index::DedupIndex;
