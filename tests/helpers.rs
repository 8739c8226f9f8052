//! Test doubles shared by the integration suites.

#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::time::Instant;
use url::Url;

use shirabe::backend::{
    AnalysisBackend, AnalysisQuery, FacetFailures, FacetResults, QueryMetrics, QueryResponse,
    RequestId, SnapshotRequest,
};
use shirabe::domain::{Diagnostic, Position, Range, Severity};
use shirabe::error::{CoreError, CoreResult};
use shirabe::pipeline::DiagnosticsPublisher;
use shirabe::snapshot::DocumentRevision;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn uri(path: &str) -> Url {
    Url::parse(&format!("file:///{path}")).unwrap()
}

pub fn error_diag(message: &str) -> Diagnostic {
    Diagnostic::new(
        Range::new(Position::new(0, 0), Position::new(0, 1)),
        Severity::Error,
        message,
    )
}

/// What the backend should answer for one document revision.
#[derive(Clone, Default)]
pub struct Script {
    pub delay: Duration,
    pub diagnostics: Vec<Diagnostic>,
    /// When set, the diagnostics facet fails with this message instead.
    pub fail_diagnostics: Option<String>,
}

impl Script {
    pub fn clean(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn with_diagnostics(delay: Duration, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            delay,
            diagnostics,
            ..Default::default()
        }
    }

    pub fn failing(delay: Duration, message: &str) -> Self {
        Self {
            delay,
            fail_diagnostics: Some(message.to_owned()),
            ..Default::default()
        }
    }
}

/// An analysis backend that answers from per-revision scripts, with
/// configurable delays so tests can stage slow stale answers racing fast
/// fresh ones.
#[derive(Default)]
pub struct ScriptedBackend {
    /// Every revision a lifecycle call handed over, in arrival order.
    minted: DashMap<Url, Vec<DocumentRevision>>,
    scripts: DashMap<(Url, u64), Script>,
    cancels: Mutex<Vec<RequestId>>,
    /// `(request_id, feature, revision answered for)` per query, in order.
    queries: Mutex<Vec<(RequestId, String, u64)>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, uri: &Url, revision: u64, script: Script) {
        self.scripts.insert((uri.clone(), revision), script);
    }

    pub fn cancelled(&self) -> Vec<RequestId> {
        self.cancels.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<(RequestId, String, u64)> {
        self.queries.lock().unwrap().clone()
    }

    /// Revisions the backend was asked to analyze, in query order.
    pub fn queried_revisions(&self) -> Vec<u64> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, revision)| *revision)
            .collect()
    }

    fn record(&self, revision: &DocumentRevision) {
        self.minted
            .entry(revision.uri.clone())
            .or_default()
            .push(revision.clone());
    }

    fn revision_struct(&self, uri: &Url, revision: u64) -> Option<DocumentRevision> {
        self.minted.get(uri).and_then(|minted| {
            minted
                .iter()
                .find(|rev| rev.revision == revision)
                .cloned()
        })
    }

    fn latest_revision(&self, uri: &Url) -> Option<u64> {
        self.minted
            .get(uri)
            .and_then(|minted| minted.iter().map(|rev| rev.revision).max())
    }
}

#[async_trait]
impl AnalysisBackend for ScriptedBackend {
    async fn open_document(&self, revision: DocumentRevision, _text: &str) -> CoreResult<()> {
        self.record(&revision);
        Ok(())
    }

    async fn change_document(
        &self,
        revision: DocumentRevision,
        _text: &str,
        _changed_range: Option<Range>,
    ) -> CoreResult<()> {
        self.record(&revision);
        Ok(())
    }

    async fn close_document(&self, revision: DocumentRevision) -> CoreResult<()> {
        self.record(&revision);
        Ok(())
    }

    async fn update_config(
        &self,
        revision: DocumentRevision,
        _settings: &serde_json::Value,
    ) -> CoreResult<()> {
        self.record(&revision);
        Ok(())
    }

    async fn cancel_request(&self, request_id: RequestId) {
        self.cancels.lock().unwrap().push(request_id);
    }

    async fn query(&self, query: AnalysisQuery) -> CoreResult<QueryResponse> {
        // "Latest" pins whatever the backend holds when the query arrives,
        // which may be older than live by the time the answer lands.
        let answered_for = match query.snapshot {
            SnapshotRequest::Exact(revision) => revision,
            SnapshotRequest::Latest => self
                .latest_revision(&query.uri)
                .ok_or_else(|| CoreError::backend("no document state held"))?,
        };
        self.queries
            .lock()
            .unwrap()
            .push((query.request_id, query.feature.clone(), answered_for));

        let script = self
            .scripts
            .get(&(query.uri.clone(), answered_for))
            .map(|script| script.clone())
            .unwrap_or_default();

        let started = Instant::now();
        tokio::time::sleep(script.delay).await;

        let snapshot_used = self
            .revision_struct(&query.uri, answered_for)
            .ok_or_else(|| CoreError::backend("revision never handed to backend"))?;
        let (facets, failures) = match script.fail_diagnostics {
            Some(message) => (
                FacetResults::default(),
                FacetFailures {
                    diagnostics: Some(message),
                    ..Default::default()
                },
            ),
            None => (
                FacetResults {
                    diagnostics: Some(script.diagnostics),
                    ..Default::default()
                },
                FacetFailures::default(),
            ),
        };
        Ok(QueryResponse {
            snapshot_used,
            facets,
            failures,
            metrics: QueryMetrics::from_elapsed(started.elapsed()),
        })
    }
}

/// Captures every publish in arrival order.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(Url, Vec<Diagnostic>)>>,
    arrived: Notify,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(Url, Vec<Diagnostic>)> {
        self.published.lock().unwrap().clone()
    }

    pub fn latest_for(&self, uri: &Url) -> Option<Vec<Diagnostic>> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(published_uri, _)| published_uri == uri)
            .map(|(_, diagnostics)| diagnostics.clone())
    }

    pub fn publish_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    /// Wait until at least `count` publishes have arrived. Wrap in
    /// `tokio::time::timeout` to bound the wait.
    pub async fn wait_for(&self, count: usize) {
        loop {
            let notified = self.arrived.notified();
            if self.publish_count() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl DiagnosticsPublisher for RecordingPublisher {
    async fn publish(&self, uri: &Url, diagnostics: Vec<Diagnostic>) {
        self.published
            .lock()
            .unwrap()
            .push((uri.clone(), diagnostics));
        self.arrived.notify_waiters();
    }
}
