//! Publishing for the SFP module registry.
//!
//! The published artifact is an [`IndexSnapshot`]: a JSON document with a
//! `version` and the ordered list of module records. The [`Publisher`] is
//! the only writer. It builds the next snapshot from the current one plus
//! an approved batch, hands it to an [`IndexSink`] that makes it visible
//! atomically, and only then swaps its in-memory pointer. Readers clone an
//! `Arc` to the current snapshot and never wait for a publish.

pub mod error;
pub mod publisher;
pub mod sink;
pub mod snapshot;

pub use error::{PublishError, PublishResult};
pub use publisher::{PublishReport, PublishedEntry, Publisher};
pub use sink::{FsIndexSink, InMemoryIndexSink, IndexSink};
pub use snapshot::IndexSnapshot;
