//! Pure skip-vs-reanalyze decision for document edits.

use crate::cache::entry::DocumentCacheEntry;
use crate::cache::hash::{fnv1a_hash, line_hashes};
use crate::domain::Range;

/// Verdict on whether cached analysis survives an edit.
///
/// Created per edit event and consumed immediately by the orchestrator;
/// nothing stores these.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangeClassification {
    pub can_skip: bool,
    /// Stable machine-readable reason, useful in logs and assertions.
    pub reason: &'static str,
}

impl ChangeClassification {
    const fn skip(reason: &'static str) -> Self {
        Self {
            can_skip: true,
            reason,
        }
    }

    const fn reanalyze(reason: &'static str) -> Self {
        Self {
            can_skip: false,
            reason,
        }
    }
}

/// Decide whether `new_text` can keep the results cached in `cached`.
///
/// Pure and idempotent: same inputs, same verdict, no side effects. The
/// decision is deliberately conservative. Skipping is only allowed when the
/// edit provably cannot affect tokenization, so a line emptied out or code
/// swapped for a comment always re-analyzes even though the new line looks
/// "simpler".
///
/// `_changed_range` is the edit span the front-end reports. It cannot bound
/// the comparison: the cached entry is refreshed only on accepted publishes
/// and skip-path edits, so it may lag several revisions behind and differ
/// well outside the latest edit.
pub fn classify_change(
    new_text: &str,
    _changed_range: Option<&Range>,
    cached: &DocumentCacheEntry,
) -> ChangeClassification {
    if fnv1a_hash(new_text) == cached.content_hash {
        return ChangeClassification::skip("content_unchanged");
    }

    let new_lines = line_hashes(new_text);
    if new_lines.len() != cached.line_hashes.len() {
        // Insertions and deletions shift everything below them.
        return ChangeClassification::reanalyze("line_count_changed");
    }

    if new_lines != cached.line_hashes {
        ChangeClassification::reanalyze("content_changed")
    } else {
        // The raw hash differs but every trailing-whitespace-stripped line
        // matches: nothing the analyzer looks at has changed.
        ChangeClassification::skip("semantic_unchanged")
    }
}
