//! Concurrency-and-consistency core for a language-intelligence server.
//!
//! A long-running server answers a high-frequency stream of editor requests
//! against documents that change under its feet. The hard part is not the
//! analysis, which an external backend performs, but never letting a slow
//! stale computation overwrite a fresh one. This crate provides the pieces
//! that make that guarantee:
//!
//! - [`schedule`] — a priority scheduler with a single execution slot,
//!   same-key coalescing and cooperative cancellation via checkpoints.
//! - [`snapshot`] — strictly increasing per-document revisions, opaque
//!   snapshot ids, debounce staleness records and the publish-time gate.
//! - [`cache`] — content and per-line fingerprints plus the pure classifier
//!   that skips re-analysis when an edit provably cannot change results.
//! - [`metrics`] — passive counters and queue-wait histograms.
//! - [`pipeline`] — the diagnostics orchestrator wiring the above to an
//!   [`backend::AnalysisBackend`] and a [`pipeline::DiagnosticsPublisher`].
//!
//! Nothing here parses text or extracts symbols, and nothing persists to
//! disk; those belong to the backend and the protocol front-end.

pub mod backend;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod schedule;
pub mod snapshot;

pub use backend::{
    AnalysisBackend, AnalysisQuery, FacetFailures, FacetResults, QueryMetrics, QueryResponse,
    RequestId, SnapshotRequest,
};
pub use cache::{ChangeClassification, DocumentCache, DocumentCacheEntry, classify_change};
pub use config::{CoreSettings, SettingsUpdate, merge_settings};
pub use error::{CoreError, CoreResult};
pub use metrics::{MetricsSnapshot, SchedulerMetrics};
pub use pipeline::{AnalysisPipeline, DiagnosticsPublisher};
pub use schedule::{Checkpoint, RequestClass, RequestScheduler};
pub use snapshot::{
    DocumentRevision, PendingValidations, PublishGate, RevisionTracker, SnapshotId,
};
