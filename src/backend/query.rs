//! Query and response shapes crossing the backend boundary.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::backend::facets::{FacetFailures, FacetResults};
use crate::snapshot::DocumentRevision;

/// Identifier of one in-flight backend request, used for cancel forwarding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Which document state a query wants answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotRequest {
    /// Whatever the backend holds when it gets around to the query. The
    /// response names the snapshot actually used.
    Latest,
    /// Pin to one revision. The backend may still answer with a newer
    /// snapshot if a mutation raced ahead; publish-time gating sorts it out.
    Exact(u64),
}

/// One feature request against one document snapshot.
#[derive(Clone, Debug)]
pub struct AnalysisQuery {
    pub request_id: RequestId,
    pub uri: Url,
    /// Feature name, opaque to the core ("diagnostics", "hover", ...).
    pub feature: String,
    pub snapshot: SnapshotRequest,
    /// Feature-specific parameters, passed through untouched.
    pub params: serde_json::Value,
}

/// Backend answer, tagged with the snapshot it was computed from.
#[derive(Clone, Debug)]
pub struct QueryResponse {
    /// The exact document state the backend analyzed. May be newer than the
    /// snapshot the query asked for, never older than what the backend held.
    pub snapshot_used: DocumentRevision,
    pub facets: FacetResults,
    pub failures: FacetFailures,
    pub metrics: QueryMetrics,
}

/// Timing the backend reports alongside each response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryMetrics {
    /// Wall-clock time the backend spent on the query, in milliseconds.
    pub backend_ms: f64,
}

impl QueryMetrics {
    pub fn from_elapsed(elapsed: Duration) -> Self {
        Self {
            backend_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_displays_stably() {
        assert_eq!(RequestId(7).to_string(), "req-7");
    }

    #[test]
    fn metrics_convert_elapsed_to_millis() {
        let metrics = QueryMetrics::from_elapsed(Duration::from_micros(2500));
        assert!((metrics.backend_ms - 2.5).abs() < 1e-9);
    }
}
