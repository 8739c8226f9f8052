//! Publish-time staleness gating.

use dashmap::DashMap;
use url::Url;

/// Logging target for publish gating decisions.
const LOG_TARGET: &str = "shirabe::publish_gate";

/// Last-accepted revision per document, consulted immediately before any
/// externally visible side effect.
///
/// Work may start and finish in any order; acceptance is what is ordered. A
/// result becomes visible only if it is at least as new as the live revision
/// and at least as new as everything already published for its document.
/// Comparing at publish time rather than completion time is what makes
/// out-of-order completions harmless.
#[derive(Default)]
pub struct PublishGate {
    accepted: DashMap<Url, u64>,
}

impl PublishGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a result produced at `result_revision` may publish
    /// while the document lives at `live_revision`. Accepting records the
    /// revision so older results that finish later stay invisible.
    pub fn try_accept(&self, uri: &Url, result_revision: u64, live_revision: u64) -> bool {
        if result_revision < live_revision {
            log::trace!(
                target: LOG_TARGET,
                "Rejecting result for {} (result revision {} behind live {})",
                uri,
                result_revision,
                live_revision
            );
            return false;
        }
        let mut accepted = self.accepted.entry(uri.clone()).or_insert(0);
        if result_revision < *accepted {
            log::trace!(
                target: LOG_TARGET,
                "Rejecting result for {} (revision {} already superseded by published {})",
                uri,
                result_revision,
                *accepted
            );
            return false;
        }
        *accepted = result_revision;
        true
    }

    /// Last revision that became visible for a document, if any.
    pub fn last_accepted(&self, uri: &Url) -> Option<u64> {
        self.accepted.get(uri).map(|revision| *revision)
    }

    /// Forget a document, used on close so the entry does not linger.
    pub fn clear(&self, uri: &Url) {
        self.accepted.remove(uri);
    }
}
