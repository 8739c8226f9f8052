//! Snapshot identity, revision tracking and publish gating.
//!
//! The three pieces here answer one question from different angles: is this
//! result still about the document the user is looking at? The tracker mints
//! revisions, the pending table remembers which revision a debounced run was
//! promised for, and the gate makes the final call right before anything
//! becomes externally visible.

pub mod gate;
pub mod pending;
pub mod revision;

pub use gate::PublishGate;
pub use pending::{PendingValidations, StalenessVerdict};
pub use revision::{DocumentRevision, RevisionTracker, SnapshotId};
