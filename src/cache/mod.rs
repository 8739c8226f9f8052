//! Document fingerprinting, cached analysis results and change
//! classification.
//!
//! The cache keeps the last accepted analysis per document together with the
//! fingerprints of the text it was computed from. The classifier compares a
//! fresh edit against those fingerprints and tells the orchestrator whether
//! re-analysis can be skipped outright.

pub mod classifier;
pub mod entry;
pub mod hash;
pub mod store;

pub use classifier::{ChangeClassification, classify_change};
pub use entry::DocumentCacheEntry;
pub use hash::{fnv1a_hash, line_hashes};
pub use store::DocumentCache;
