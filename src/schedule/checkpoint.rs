//! Cooperative cancellation points for running work.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, CoreResult};

/// Cancellation point handed to every scheduled run.
///
/// Running work is never interrupted from the outside. The run calls
/// [`Checkpoint::check`] at its own safe points and unwinds with a
/// supersession error once a newer unit with the same coalescing key has been
/// scheduled. Long-lived awaits should race [`Checkpoint::cancelled`] instead,
/// so a supersession arriving mid-await takes effect within the wait rather
/// than after it.
#[derive(Clone, Debug)]
pub struct Checkpoint {
    token: CancellationToken,
    key: Option<Arc<str>>,
}

impl Checkpoint {
    pub(crate) fn new(token: CancellationToken, key: Option<Arc<str>>) -> Self {
        Self { token, key }
    }

    /// Checkpoint for work driven outside any scheduler. Never cancels.
    pub fn detached() -> Self {
        Self {
            token: CancellationToken::new(),
            key: None,
        }
    }

    /// Unwind with a supersession error if a newer unit replaced this run.
    pub fn check(&self) -> CoreResult<()> {
        if self.token.is_cancelled() {
            Err(CoreError::superseded(self.key.as_deref()))
        } else {
            Ok(())
        }
    }

    /// True once a newer unit with the same key has been scheduled.
    pub fn is_superseded(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once this run is superseded. Race long backend awaits
    /// against this to keep cancellation latency bounded.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Coalescing key this run was scheduled under, if any.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}
