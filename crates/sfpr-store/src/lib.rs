//! Content-addressed blob storage for the SFP module registry.
//!
//! Every EEPROM image is stored under its SHA-256 digest. The storage-layer
//! name of a blob is literally `<digest>.bin`, so any blob can be verified
//! by re-hashing what is found under its name.
//!
//! # Storage Backends
//!
//! All backends implement the [`ContentStore`] trait:
//!
//! - [`InMemoryContentStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsContentStore`] -- flat directory of `<digest>.bin` files
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once written; there is no update and no delete.
//! 2. `put` is idempotent: a known digest is a successful no-op.
//! 3. Reads re-hash the bytes and refuse to return corrupt data.
//! 4. Concurrent writers of the same digest never corrupt the store.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{IntegrityIssue, StoreError, StoreResult};
pub use fs::FsContentStore;
pub use memory::InMemoryContentStore;
pub use traits::ContentStore;
