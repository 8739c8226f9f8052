//! Concurrent store of per-document analysis results.

use dashmap::DashMap;
use url::Url;

use crate::cache::entry::DocumentCacheEntry;
use crate::domain::{Diagnostic, SymbolInfo};

/// Logging target for cache mutations.
const LOG_TARGET: &str = "shirabe::cache";

/// Cached analysis results keyed by document uri.
///
/// Readers get an owned clone of the entry, captured at dispatch time, so
/// in-flight queries never observe a half-applied update and the store needs
/// no outward-facing locks. Mutation happens only from the orchestrator and
/// the document lifecycle entry points.
#[derive(Default)]
pub struct DocumentCache {
    entries: DashMap<Url, DocumentCacheEntry>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the cached entry for a document, if any.
    pub fn get(&self, uri: &Url) -> Option<DocumentCacheEntry> {
        self.entries.get(uri).map(|entry| entry.clone())
    }

    pub fn insert(&self, uri: &Url, entry: DocumentCacheEntry) {
        self.entries.insert(uri.clone(), entry);
    }

    /// Drop the entry for a closed document.
    pub fn remove(&self, uri: &Url) {
        self.entries.remove(uri);
    }

    /// Store freshly accepted analysis results for `version`.
    ///
    /// Older versions never clobber newer ones; the publish gate normally
    /// prevents that, and the version check here keeps the invariant local.
    pub fn apply_analysis(
        &self,
        uri: &Url,
        version: u64,
        text: &str,
        symbols: Vec<SymbolInfo>,
        diagnostics: Vec<Diagnostic>,
    ) {
        let entry = DocumentCacheEntry::from_analysis(version, text, symbols, diagnostics);
        match self.entries.entry(uri.clone()) {
            dashmap::Entry::Occupied(mut occupied) => {
                if occupied.get().version <= version {
                    occupied.insert(entry);
                } else {
                    log::trace!(
                        target: LOG_TARGET,
                        "Ignoring analysis for {} at version {} (cache already at {})",
                        uri,
                        version,
                        occupied.get().version
                    );
                }
            }
            dashmap::Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }
    }

    /// Re-fingerprint a cached entry for a skippable edit, keeping its
    /// results. Returns false when nothing is cached for the uri.
    pub fn refresh_fingerprints(&self, uri: &Url, version: u64, text: &str) -> bool {
        match self.entries.get_mut(uri) {
            Some(mut entry) => {
                entry.refresh_fingerprints(version, text);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
