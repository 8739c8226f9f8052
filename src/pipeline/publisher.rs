//! Outbound diagnostics seam.

use async_trait::async_trait;
use url::Url;

use crate::domain::Diagnostic;

/// Sink for authoritative diagnostics.
///
/// The pipeline calls this only after the staleness gates pass, so an
/// implementation can forward straight to the editor without its own
/// ordering checks. Publishing an empty list clears previous findings.
#[async_trait]
pub trait DiagnosticsPublisher: Send + Sync {
    async fn publish(&self, uri: &Url, diagnostics: Vec<Diagnostic>);
}
