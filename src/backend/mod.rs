//! Contract with the external analysis backend.
//!
//! The backend is an opaque request/response service: it receives document
//! lifecycle calls tagged with the revision the tracker minted for them,
//! answers queries against the snapshot it holds, and accepts opportunistic
//! cancellation of requests the core no longer cares about. Nothing here
//! starts, restarts or supervises the backend process.

pub mod facets;
pub mod query;

pub use facets::{FacetFailures, FacetResults};
pub use query::{AnalysisQuery, QueryMetrics, QueryResponse, RequestId, SnapshotRequest};

use async_trait::async_trait;

use crate::domain::Range;
use crate::error::CoreResult;
use crate::snapshot::DocumentRevision;

/// Asynchronous analysis service the core orchestrates.
///
/// Implementations may answer slowly, out of order, or with a newer snapshot
/// than a query pinned; the core never trusts response order and validates
/// every result against live state before it becomes visible.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// A document became visible to the editor at `revision`.
    async fn open_document(&self, revision: DocumentRevision, text: &str) -> CoreResult<()>;

    /// An open document changed. `changed_range` localizes the edit when the
    /// front-end provides it; `text` is always the full new content.
    async fn change_document(
        &self,
        revision: DocumentRevision,
        text: &str,
        changed_range: Option<Range>,
    ) -> CoreResult<()>;

    /// An open document closed. The revision is the close mutation's own.
    async fn close_document(&self, revision: DocumentRevision) -> CoreResult<()>;

    /// Configuration changed. Called once per open document with the
    /// revision minted for it, so the backend re-pins its analysis state.
    async fn update_config(
        &self,
        revision: DocumentRevision,
        settings: &serde_json::Value,
    ) -> CoreResult<()>;

    /// Best-effort hint that a request's answer is no longer wanted.
    /// Fire-and-forget: failures are ignored, the staleness gates already
    /// guarantee a late answer stays invisible.
    async fn cancel_request(&self, request_id: RequestId);

    /// Answer one feature query against one snapshot.
    async fn query(&self, query: AnalysisQuery) -> CoreResult<QueryResponse>;
}
