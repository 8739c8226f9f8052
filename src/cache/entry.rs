//! Cached analysis results with the fingerprints needed to invalidate them.

use std::collections::{HashMap, HashSet};

use crate::cache::hash::{fnv1a_hash, line_hashes};
use crate::domain::{Diagnostic, Position, SymbolInfo};

/// Analysis results for one accepted document version.
///
/// The fingerprints describe the exact text the results were computed from;
/// the classifier compares a new edit against them to decide whether the
/// results survive. The symbol indexes are derived once at insert time so
/// lookup-heavy consumers never rescan the symbol list.
#[derive(Clone, Debug, Default)]
pub struct DocumentCacheEntry {
    /// Revision the cached results were accepted for.
    pub version: u64,
    /// FNV-1a hash of the full document text.
    pub content_hash: u64,
    /// Per-line hashes with trailing whitespace stripped.
    pub line_hashes: Vec<u64>,
    pub symbols: Vec<SymbolInfo>,
    pub diagnostics: Vec<Diagnostic>,
    /// Symbol name to every definition position carrying it.
    pub symbol_positions: HashMap<String, Vec<Position>>,
    /// Fast membership checks for completion-style lookups.
    pub symbol_names: HashSet<String>,
}

impl DocumentCacheEntry {
    /// Build an entry from freshly accepted analysis results.
    pub fn from_analysis(
        version: u64,
        text: &str,
        symbols: Vec<SymbolInfo>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        let mut symbol_positions: HashMap<String, Vec<Position>> = HashMap::new();
        let mut symbol_names = HashSet::with_capacity(symbols.len());
        for symbol in &symbols {
            symbol_positions
                .entry(symbol.name.clone())
                .or_default()
                .push(symbol.definition_position());
            symbol_names.insert(symbol.name.clone());
        }
        Self {
            version,
            content_hash: fnv1a_hash(text),
            line_hashes: line_hashes(text),
            symbols,
            diagnostics,
            symbol_positions,
            symbol_names,
        }
    }

    /// Re-fingerprint the entry for a new document version without touching
    /// the cached results. Used when an edit was classified as skippable.
    pub fn refresh_fingerprints(&mut self, version: u64, text: &str) {
        self.version = version;
        self.content_hash = fnv1a_hash(text);
        self.line_hashes = line_hashes(text);
    }

    pub fn line_count(&self) -> usize {
        self.line_hashes.len()
    }

    pub fn has_symbol(&self, name: &str) -> bool {
        self.symbol_names.contains(name)
    }
}
