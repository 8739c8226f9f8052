//! Per-document revision tracking with opaque snapshot identity.
//!
//! Every mutation of a document mints the next revision number for its uri
//! together with a fresh snapshot id. Revision numbers order results;
//! snapshot ids merely name the immutable view a result was computed from.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use url::Url;

use crate::error::{CoreError, CoreResult};

/// Opaque identifier naming one immutable view of a document.
///
/// Consumers never parse or order these; ordering questions go through the
/// revision number the id travels with.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Mint a fresh id. ULIDs keep ids unique across documents and restarts.
    fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document pinned at one revision, with the snapshot id minted for it.
///
/// This is the version tag that travels with every backend call and comes
/// back on every result, so publish-time comparisons are a single integer
/// compare against the live revision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentRevision {
    pub uri: Url,
    pub revision: u64,
    pub snapshot_id: SnapshotId,
}

impl DocumentRevision {
    pub fn new(uri: Url, revision: u64, snapshot_id: SnapshotId) -> Self {
        Self {
            uri,
            revision,
            snapshot_id,
        }
    }
}

/// Live state for one uri. Survives close so revisions are never reused.
#[derive(Debug)]
struct DocumentState {
    revision: u64,
    snapshot_id: SnapshotId,
    open: bool,
}

/// Tracks the live revision of every document the server has seen.
///
/// Revisions are strictly increasing per uri and never reused: the entry
/// outlives a close, so a reopened document continues its sequence instead of
/// restarting. This keeps "newer" well defined for results that race a
/// close/reopen pair. The tracker is the only place snapshot ids are minted.
#[derive(Default)]
pub struct RevisionTracker {
    states: DashMap<Url, DocumentState>,
}

impl RevisionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an open and mint the next revision for the uri.
    ///
    /// Opening an already-open document is treated as another structural
    /// mutation and advances the revision like any other.
    pub fn open(&self, uri: &Url) -> DocumentRevision {
        let mut state = self.states.entry(uri.clone()).or_insert_with(|| DocumentState {
            revision: 0,
            snapshot_id: SnapshotId::generate(),
            open: false,
        });
        state.revision += 1;
        state.snapshot_id = SnapshotId::generate();
        state.open = true;
        DocumentRevision::new(uri.clone(), state.revision, state.snapshot_id.clone())
    }

    /// Record a content mutation on an open document.
    pub fn advance(&self, uri: &Url) -> CoreResult<DocumentRevision> {
        match self.states.get_mut(uri) {
            Some(mut state) if state.open => {
                state.revision += 1;
                state.snapshot_id = SnapshotId::generate();
                Ok(DocumentRevision::new(
                    uri.clone(),
                    state.revision,
                    state.snapshot_id.clone(),
                ))
            }
            _ => Err(CoreError::document_not_found(uri.as_str())),
        }
    }

    /// Record a close. The entry stays behind so in-flight results for the
    /// closed document still compare as stale, and a reopen continues the
    /// revision sequence.
    pub fn close(&self, uri: &Url) -> CoreResult<DocumentRevision> {
        match self.states.get_mut(uri) {
            Some(mut state) if state.open => {
                state.revision += 1;
                state.snapshot_id = SnapshotId::generate();
                state.open = false;
                Ok(DocumentRevision::new(
                    uri.clone(),
                    state.revision,
                    state.snapshot_id.clone(),
                ))
            }
            _ => Err(CoreError::document_not_found(uri.as_str())),
        }
    }

    /// Live revision of an open document. `None` once closed or never opened.
    pub fn current(&self, uri: &Url) -> Option<DocumentRevision> {
        self.states
            .get(uri)
            .filter(|state| state.open)
            .map(|state| {
                DocumentRevision::new(uri.clone(), state.revision, state.snapshot_id.clone())
            })
    }

    pub fn is_open(&self, uri: &Url) -> bool {
        self.states.get(uri).is_some_and(|state| state.open)
    }

    /// Mint a fresh revision for every open document. Used when a
    /// configuration change invalidates all analysis state at once.
    pub fn advance_all_open(&self) -> Vec<DocumentRevision> {
        let mut minted = Vec::new();
        for mut state in self.states.iter_mut() {
            if state.open {
                state.revision += 1;
                state.snapshot_id = SnapshotId::generate();
                minted.push(DocumentRevision::new(
                    state.key().clone(),
                    state.revision,
                    state.snapshot_id.clone(),
                ));
            }
        }
        minted
    }
}
