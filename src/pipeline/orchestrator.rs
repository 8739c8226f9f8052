//! The diagnostics pipeline: one logical editor event in, at most one
//! authoritative published result out.
//!
//! # Architecture
//!
//! ```text
//! edit arrives
//!       │
//!       ├─► classifier: skip? ──yes──► refresh fingerprints,
//!       │                              republish cached diagnostics
//!       │no
//!       ├─► tracker mints revision + snapshot id
//!       ├─► pending table records the promised revision
//!       │
//!       └─► scheduler (key: the uri, window: debounce)
//!               │   burst of edits ⇒ one surviving validation
//!               ▼
//!        validation run
//!               ├─► pending vs live: moved on? drop silently
//!               ├─► backend query, racing the checkpoint
//!               │       superseded mid-await ⇒ forward cancel_request
//!               └─► publish gate at the very end, then publish + cache
//! ```
//!
//! # Key Design Decision: Validate at Publish Time
//!
//! The backend may answer slowly and out of order. No ordering of futures is
//! trusted anywhere; a result becomes visible only if the publish gate accepts
//! its revision against live state at the moment of publishing. A slow answer
//! for an old revision simply fails that comparison and vanishes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use url::Url;

use crate::backend::{AnalysisBackend, AnalysisQuery, QueryResponse, RequestId, SnapshotRequest};
use crate::cache::{ChangeClassification, DocumentCache, classify_change};
use crate::config::{CoreSettings, SettingsUpdate, merge_settings};
use crate::domain::Range;
use crate::error::{CoreError, CoreResult};
use crate::metrics::{MetricsSnapshot, SchedulerMetrics};
use crate::pipeline::publisher::DiagnosticsPublisher;
use crate::schedule::{Checkpoint, RequestClass, RequestScheduler};
use crate::snapshot::{
    DocumentRevision, PendingValidations, PublishGate, RevisionTracker, StalenessVerdict,
};

/// Logging target for the pipeline.
const LOG_TARGET: &str = "shirabe::pipeline";

/// Feature name of the debounced validation query.
const DIAGNOSTICS_FEATURE: &str = "diagnostics";

/// State shared between the pipeline handle and its spawned validation runs.
struct PipelineShared {
    scheduler: RequestScheduler,
    metrics: Arc<SchedulerMetrics>,
    backend: Arc<dyn AnalysisBackend>,
    publisher: Arc<dyn DiagnosticsPublisher>,
    tracker: RevisionTracker,
    pending: PendingValidations,
    gate: PublishGate,
    cache: DocumentCache,
    /// Live text per open document, captured for validation runs and
    /// config-triggered revalidation.
    documents: DashMap<Url, String>,
    settings: ArcSwap<CoreSettings>,
    next_request_id: AtomicU64,
}

/// Orchestrates scheduler, tracker, classifier and backend for the
/// diagnostics flow, and offers pinned queries to feature handlers.
///
/// One instance per server, passed explicitly to whatever needs it. Must be
/// created inside a Tokio runtime; construction spawns the scheduler's
/// executor task.
pub struct AnalysisPipeline {
    shared: Arc<PipelineShared>,
}

impl AnalysisPipeline {
    pub fn new(
        backend: Arc<dyn AnalysisBackend>,
        publisher: Arc<dyn DiagnosticsPublisher>,
        settings: CoreSettings,
    ) -> Self {
        let metrics = Arc::new(SchedulerMetrics::new());
        Self {
            shared: Arc::new(PipelineShared {
                scheduler: RequestScheduler::new(Arc::clone(&metrics)),
                metrics,
                backend,
                publisher,
                tracker: RevisionTracker::new(),
                pending: PendingValidations::new(),
                gate: PublishGate::new(),
                cache: DocumentCache::new(),
                documents: DashMap::new(),
                settings: ArcSwap::from_pointee(settings),
                next_request_id: AtomicU64::new(1),
            }),
        }
    }

    /// Record an open, notify the backend and schedule the first validation.
    pub async fn open_document(&self, uri: &Url, text: &str) -> CoreResult<DocumentRevision> {
        let revision = self.shared.tracker.open(uri);
        self.shared.documents.insert(uri.clone(), text.to_owned());
        log::debug!(
            target: LOG_TARGET,
            "Opened {} at revision {}",
            uri,
            revision.revision
        );

        if let Err(err) = self
            .shared
            .backend
            .open_document(revision.clone(), text)
            .await
        {
            log::warn!(target: LOG_TARGET, "Backend open failed for {}: {}", uri, err);
        }

        Self::schedule_validation(&self.shared, revision.clone(), text.to_owned());
        Ok(revision)
    }

    /// Record an edit, classify it, and either refresh fingerprints in place
    /// or schedule a debounced re-validation.
    pub async fn change_document(
        &self,
        uri: &Url,
        text: &str,
        changed_range: Option<Range>,
    ) -> CoreResult<(DocumentRevision, ChangeClassification)> {
        let revision = self.shared.tracker.advance(uri)?;
        self.shared.documents.insert(uri.clone(), text.to_owned());

        if let Err(err) = self
            .shared
            .backend
            .change_document(revision.clone(), text, changed_range)
            .await
        {
            log::warn!(target: LOG_TARGET, "Backend change failed for {}: {}", uri, err);
        }

        let classification = match self.shared.cache.get(uri) {
            Some(entry) => classify_change(text, changed_range.as_ref(), &entry),
            None => ChangeClassification {
                can_skip: false,
                reason: "no_cached_analysis",
            },
        };

        if classification.can_skip {
            log::debug!(
                target: LOG_TARGET,
                "Skipping re-analysis of {} at revision {} ({})",
                uri,
                revision.revision,
                classification.reason
            );
            self.shared
                .cache
                .refresh_fingerprints(uri, revision.revision, text);
            if self.shared.settings.load().publish_skipped_revisions
                && let Some(entry) = self.shared.cache.get(uri)
                && self
                    .shared
                    .gate
                    .try_accept(uri, revision.revision, revision.revision)
            {
                self.shared.publisher.publish(uri, entry.diagnostics).await;
            }
        } else {
            Self::schedule_validation(&self.shared, revision.clone(), text.to_owned());
        }

        Ok((revision, classification))
    }

    /// Record a close, clear per-document state and wipe editor diagnostics.
    pub async fn close_document(&self, uri: &Url) -> CoreResult<DocumentRevision> {
        let revision = self.shared.tracker.close(uri)?;
        self.shared.documents.remove(uri);
        self.shared.pending.clear(uri);
        self.shared.gate.clear(uri);
        self.shared.cache.remove(uri);

        if let Err(err) = self.shared.backend.close_document(revision.clone()).await {
            log::warn!(target: LOG_TARGET, "Backend close failed for {}: {}", uri, err);
        }

        // Stale squiggles must not outlive the document in the editor.
        self.shared.publisher.publish(uri, Vec::new()).await;
        log::debug!(target: LOG_TARGET, "Closed {} at revision {}", uri, revision.revision);
        Ok(revision)
    }

    /// Apply a configuration payload. Every open document gets a fresh
    /// revision so in-flight queries turn stale, then revalidates.
    pub async fn update_config(
        &self,
        value: &serde_json::Value,
    ) -> CoreResult<Vec<DocumentRevision>> {
        let update = SettingsUpdate::from_value(value)?;
        let current = self.shared.settings.load();
        let merged = merge_settings(&current, update);
        drop(current);
        self.shared.settings.store(Arc::new(merged));

        let minted = self.shared.tracker.advance_all_open();
        log::debug!(
            target: LOG_TARGET,
            "Configuration updated, {} open document(s) re-pinned",
            minted.len()
        );
        for revision in &minted {
            if let Err(err) = self
                .shared
                .backend
                .update_config(revision.clone(), value)
                .await
            {
                log::warn!(
                    target: LOG_TARGET,
                    "Backend config update failed for {}: {}",
                    revision.uri,
                    err
                );
            }
            if let Some(text) = self
                .shared
                .documents
                .get(&revision.uri)
                .map(|text| text.clone())
            {
                Self::schedule_validation(&self.shared, revision.clone(), text);
            }
        }
        Ok(minted)
    }

    /// One feature query for hover/completion-style handlers, issued against
    /// the latest snapshot the backend holds.
    ///
    /// Scheduled under `class` with a per-feature-per-document key, so a
    /// newer identical request supersedes an older one. The revision live at
    /// issue time is only a floor: the backend may answer from something
    /// newer. A response computed against a snapshot older than live at
    /// return time surfaces as [`CoreError::StaleSnapshot`]; the handler
    /// decides whether to retry, show a cached result, or show nothing.
    pub async fn query(
        &self,
        class: RequestClass,
        feature: &str,
        uri: &Url,
        params: serde_json::Value,
    ) -> CoreResult<QueryResponse> {
        let issued_at = self
            .shared
            .tracker
            .current(uri)
            .ok_or_else(|| CoreError::document_not_found(uri.as_str()))?;
        let request_id = self.next_request_id();
        log::trace!(
            target: LOG_TARGET,
            "Query {} {} for {} issued at revision {}",
            request_id,
            feature,
            uri,
            issued_at.revision
        );

        let key = format!("{feature}:{uri}");
        let shared = Arc::clone(&self.shared);
        let uri = uri.clone();
        let feature = feature.to_owned();
        self.shared
            .scheduler
            .schedule(class, Some(&key), None, move |checkpoint| async move {
                checkpoint.check()?;
                let query = AnalysisQuery {
                    request_id,
                    uri: uri.clone(),
                    feature,
                    snapshot: SnapshotRequest::Latest,
                    params,
                };
                let response = tokio::select! {
                    response = shared.backend.query(query) => response?,
                    _ = checkpoint.cancelled() => {
                        forward_cancel(&shared.backend, request_id);
                        return Err(CoreError::superseded(checkpoint.key()));
                    }
                };
                checkpoint.check()?;

                let live = shared
                    .tracker
                    .current(&uri)
                    .ok_or_else(|| CoreError::document_not_found(uri.as_str()))?;
                if response.snapshot_used.revision < live.revision {
                    return Err(CoreError::stale_snapshot(
                        uri.as_str(),
                        response.snapshot_used.revision,
                        live.revision,
                    ));
                }
                Ok(response)
            })
            .await
    }

    /// Point-in-time scheduler metrics.
    pub fn snapshot_metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// The scheduler, for callers submitting their own work.
    pub fn scheduler(&self) -> &RequestScheduler {
        &self.shared.scheduler
    }

    /// Cached analysis for a document, captured at call time.
    pub fn cached(&self, uri: &Url) -> Option<crate::cache::DocumentCacheEntry> {
        self.shared.cache.get(uri)
    }

    /// Live revision of an open document.
    pub fn current_revision(&self, uri: &Url) -> Option<DocumentRevision> {
        self.shared.tracker.current(uri)
    }

    /// Currently effective settings.
    pub fn settings(&self) -> Arc<CoreSettings> {
        self.shared.settings.load_full()
    }

    /// Stop the scheduler, discarding queued work as superseded.
    pub async fn shutdown(&self) {
        self.shared.scheduler.shutdown().await;
    }

    fn next_request_id(&self) -> RequestId {
        RequestId(self.shared.next_request_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Record the promised revision and hand a validation run to the
    /// scheduler. Text is captured now; the run never rereads live state it
    /// is not allowed to trust.
    fn schedule_validation(shared: &Arc<PipelineShared>, revision: DocumentRevision, text: String) {
        shared.pending.record(&revision.uri, revision.revision);
        let request_id = RequestId(shared.next_request_id.fetch_add(1, Ordering::SeqCst));
        // Keyed in its own namespace: a handler querying the diagnostics
        // feature through `query` must never supersede a held validation.
        let key = format!("validate:{}", revision.uri);
        let window = shared.settings.load().validation_debounce();

        let run_shared = Arc::clone(shared);
        let handle = shared.scheduler.schedule(
            RequestClass::Background,
            Some(&key),
            Some(window),
            move |checkpoint| run_validation(run_shared, revision, text, request_id, checkpoint),
        );

        // The caller of change_document must not wait out the debounce;
        // settle the handle on a driver task instead.
        tokio::spawn(async move {
            match handle.await {
                Ok(()) => {}
                Err(err) if err.is_superseded() => {
                    log::trace!(target: LOG_TARGET, "Validation superseded: {}", err);
                }
                Err(err) => {
                    log::warn!(target: LOG_TARGET, "Validation failed: {}", err);
                }
            }
        });
    }
}

/// Fire-and-forget cancel forwarding. The gates already keep a late answer
/// invisible; this only saves the backend wasted work.
fn forward_cancel(backend: &Arc<dyn AnalysisBackend>, request_id: RequestId) {
    let backend = Arc::clone(backend);
    tokio::spawn(async move {
        backend.cancel_request(request_id).await;
    });
}

/// The debounced validation body: staleness check, backend query, gated
/// publish.
async fn run_validation(
    shared: Arc<PipelineShared>,
    revision: DocumentRevision,
    text: String,
    request_id: RequestId,
    checkpoint: Checkpoint,
) -> CoreResult<()> {
    checkpoint.check()?;
    let uri = revision.uri.clone();

    let Some(live) = shared.tracker.current(&uri) else {
        // Closed while queued; nothing to answer for.
        shared.pending.clear_if(&uri, revision.revision);
        return Ok(());
    };
    if let StalenessVerdict::Stale { expected } = shared.pending.verdict(&uri, live.revision) {
        log::debug!(
            target: LOG_TARGET,
            "Dropping validation for {} (promised revision {}, live {})",
            uri,
            expected,
            live.revision
        );
        shared.pending.clear_if(&uri, expected);
        return Ok(());
    }

    let query = AnalysisQuery {
        request_id,
        uri: uri.clone(),
        feature: DIAGNOSTICS_FEATURE.to_owned(),
        snapshot: SnapshotRequest::Exact(revision.revision),
        params: serde_json::Value::Null,
    };
    let response = tokio::select! {
        response = shared.backend.query(query) => response,
        _ = checkpoint.cancelled() => {
            forward_cancel(&shared.backend, request_id);
            return Err(CoreError::superseded(checkpoint.key()));
        }
    };
    checkpoint.check()?;

    let response = match response {
        Ok(response) => response,
        Err(err) => {
            // Backend trouble degrades to keeping the previous state visible.
            log::warn!(target: LOG_TARGET, "Validation query failed for {}: {}", uri, err);
            shared.pending.clear_if(&uri, revision.revision);
            return Err(err);
        }
    };

    if let Some(message) = &response.failures.diagnostics {
        log::debug!(
            target: LOG_TARGET,
            "Diagnostics facet failed for {}: {}",
            uri,
            message
        );
        shared.pending.clear_if(&uri, revision.revision);
        return Ok(());
    }
    let Some(diagnostics) = response.facets.diagnostics else {
        log::debug!(
            target: LOG_TARGET,
            "Backend answered without a diagnostics facet for {}",
            uri
        );
        shared.pending.clear_if(&uri, revision.revision);
        return Ok(());
    };

    let result_revision = response.snapshot_used.revision;
    if let Some(live) = shared.tracker.current(&uri)
        && shared.gate.try_accept(&uri, result_revision, live.revision)
    {
        shared.publisher.publish(&uri, diagnostics.clone()).await;
        // The captured text only describes our own revision; a newer
        // snapshot's fingerprints belong to that revision's validation.
        if result_revision == revision.revision {
            let symbols = response.facets.symbols.unwrap_or_default();
            shared
                .cache
                .apply_analysis(&uri, result_revision, &text, symbols, diagnostics);
        }
    }
    shared.pending.clear_if(&uri, revision.revision);
    Ok(())
}
