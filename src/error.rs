//! Error handling types for shirabe
//!
//! This module provides error types used throughout the analysis core.

use std::sync::PoisonError;
use thiserror::Error;

/// Comprehensive error type for analysis-core operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// A newer request with the same coalescing key replaced this one
    #[error("Request superseded{}", key_suffix(.key))]
    Superseded { key: Option<String> },

    /// The analysis backend reported a failure
    #[error("Backend error: {message}")]
    Backend { message: String },

    /// A result was produced against a snapshot older than the live document
    #[error("Stale snapshot for {uri}: result revision {result} behind live {live}")]
    StaleSnapshot { uri: String, result: u64, live: u64 },

    /// Document not tracked by the revision tracker
    #[error("Document not found: {uri}")]
    DocumentNotFound { uri: String },

    /// Configuration error
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn key_suffix(key: &Option<String>) -> String {
    match key {
        Some(key) => format!(" (key: {key})"),
        None => String::new(),
    }
}

/// Result type for analysis-core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Helper trait to convert PoisonError to CoreError
pub trait LockResultExt<T> {
    /// Convert a PoisonError to CoreError with recovery and logging.
    ///
    /// The context parameter identifies which operation triggered lock recovery,
    /// helping developers debug thread safety issues.
    fn recover_poison(self, context: &str) -> Result<T, CoreError>;
}

impl<T> LockResultExt<T> for Result<T, PoisonError<T>> {
    fn recover_poison(self, context: &str) -> Result<T, CoreError> {
        match self {
            Ok(guard) => Ok(guard),
            Err(poisoned) => {
                log::warn!(
                    target: "shirabe::lock_recovery",
                    "Recovered from poisoned lock in {}",
                    context
                );
                Ok(poisoned.into_inner())
            }
        }
    }
}

/// Helper functions for common error patterns
impl CoreError {
    /// Create a superseded error carrying the coalescing key that replaced us
    pub fn superseded(key: Option<&str>) -> Self {
        CoreError::Superseded {
            key: key.map(str::to_owned),
        }
    }

    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        CoreError::Backend {
            message: message.into(),
        }
    }

    /// Create a stale snapshot error
    pub fn stale_snapshot(uri: impl Into<String>, result: u64, live: u64) -> Self {
        CoreError::StaleSnapshot {
            uri: uri.into(),
            result,
            live,
        }
    }

    /// Create a document not found error
    pub fn document_not_found(uri: impl Into<String>) -> Self {
        CoreError::DocumentNotFound { uri: uri.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        CoreError::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        CoreError::Internal(message.into())
    }

    /// True when the error only signals that newer work replaced this request.
    ///
    /// Supersession is the expected fate of most editing-burst work, so callers
    /// usually branch on this before logging anything above trace level.
    pub fn is_superseded(&self) -> bool {
        matches!(self, CoreError::Superseded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superseded_display_includes_key() {
        let err = CoreError::superseded(Some("file:///a.rs"));
        assert_eq!(err.to_string(), "Request superseded (key: file:///a.rs)");
        assert!(err.is_superseded());
    }

    #[test]
    fn superseded_display_without_key() {
        let err = CoreError::superseded(None);
        assert_eq!(err.to_string(), "Request superseded");
    }

    #[test]
    fn stale_snapshot_display_names_revisions() {
        let err = CoreError::stale_snapshot("file:///a.rs", 4, 7);
        assert_eq!(
            err.to_string(),
            "Stale snapshot for file:///a.rs: result revision 4 behind live 7"
        );
        assert!(!err.is_superseded());
    }

    #[test]
    fn recover_poison_returns_inner_value() {
        use std::sync::{Arc, Mutex};

        let lock = Arc::new(Mutex::new(5_i32));
        let poisoner = Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        let guard = lock.lock().recover_poison("test").unwrap();
        assert_eq!(*guard, 5);
    }
}
