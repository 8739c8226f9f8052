//! Query orchestration: the consumer that drives scheduler, tracker,
//! classifier and backend for each editor event and publishes at most one
//! authoritative result per document revision.

pub mod orchestrator;
pub mod publisher;

pub use orchestrator::AnalysisPipeline;
pub use publisher::DiagnosticsPublisher;
