//! Per-facet analysis results.
//!
//! A query asks the backend for several facets of one snapshot. Each facet
//! succeeds or fails on its own: a construct the type introspector chokes on
//! must not hide the syntax diagnostics computed right next to it. Failures
//! are data in a record parallel to the successes, never thrown.

use serde::{Deserialize, Serialize};

use crate::domain::{Diagnostic, SymbolInfo};

/// Successful facets of one query, each optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FacetResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbols: Option<Vec<SymbolInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Vec<Diagnostic>>,
    /// Type introspection payload, opaque to the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<serde_json::Value>,
}

impl FacetResults {
    pub fn is_empty(&self) -> bool {
        self.symbols.is_none() && self.diagnostics.is_none() && self.types.is_none()
    }
}

/// Failure messages for facets the backend could not compute.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FacetFailures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbols: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<String>,
}

impl FacetFailures {
    pub fn is_empty(&self) -> bool {
        self.symbols.is_none() && self.diagnostics.is_none() && self.types.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Position, Range, Severity};

    #[test]
    fn partial_failure_leaves_other_facets_intact() {
        let facets = FacetResults {
            diagnostics: Some(vec![Diagnostic::new(
                Range::new(Position::new(0, 0), Position::new(0, 3)),
                Severity::Error,
                "unexpected token",
            )]),
            ..Default::default()
        };
        let failures = FacetFailures {
            types: Some("cannot introspect generic bound".to_owned()),
            ..Default::default()
        };

        assert!(!facets.is_empty());
        assert!(!failures.is_empty());
        assert!(facets.diagnostics.is_some(), "diagnostics survive a type failure");
        assert!(failures.diagnostics.is_none());
    }

    #[test]
    fn facet_records_serialize_sparsely() {
        let json = serde_json::to_value(FacetResults::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }
}
