//! Debounce bookkeeping for pending validations.

use dashmap::DashMap;
use url::Url;

/// Outcome of comparing a fired validation against the live revision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StalenessVerdict {
    /// Live state still matches what the run was scheduled for (or nothing
    /// was promised at all), so the run may proceed.
    Fresh,
    /// The document moved on without scheduling a replacement run; the fired
    /// run must drop silently.
    Stale { expected: u64 },
}

/// Per-document record of the revision the next validation run answers for.
///
/// A mutation that schedules a validation overwrites the record. Mutations
/// that do not schedule one (whitespace-only edits, closes, pinned queries)
/// leave the old record behind, and that mismatch is what stops a
/// later-firing run from publishing for a state nobody asked about.
#[derive(Default)]
pub struct PendingValidations {
    expected: DashMap<Url, u64>,
}

impl PendingValidations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the revision the next run should answer for. Overwrites any
    /// previous expectation for the uri.
    pub fn record(&self, uri: &Url, revision: u64) {
        self.expected.insert(uri.clone(), revision);
    }

    /// Compare the live revision against the recorded expectation.
    pub fn verdict(&self, uri: &Url, live_revision: u64) -> StalenessVerdict {
        match self.expected.get(uri) {
            Some(expected) if *expected != live_revision => StalenessVerdict::Stale {
                expected: *expected,
            },
            _ => StalenessVerdict::Fresh,
        }
    }

    /// Drop the record once its run published or was abandoned. Keyed on the
    /// observed revision so a slow run cannot erase a newer expectation.
    pub fn clear_if(&self, uri: &Url, revision: u64) {
        self.expected.remove_if(uri, |_, expected| *expected == revision);
    }

    /// Drop any record for the uri, used when the document closes.
    pub fn clear(&self, uri: &Url) {
        self.expected.remove(uri);
    }

    pub fn expected(&self, uri: &Url) -> Option<u64> {
        self.expected.get(uri).map(|expected| *expected)
    }
}
