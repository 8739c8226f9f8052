//! Runtime-tunable settings for the analysis core.
//!
//! Settings arrive as partial JSON payloads (editor `didChangeConfiguration`
//! style) and merge over the current values, primary over fallback. The
//! pipeline holds the merged result behind an `ArcSwap`, so readers never
//! block a configuration update.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

const DEFAULT_VALIDATION_DEBOUNCE_MS: u64 = 500;
const DEFAULT_TYPING_COALESCE_MS: u64 = 25;

/// Tunables consulted by the pipeline and its callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoreSettings {
    /// Quiet period after the last edit before validation runs.
    ///
    /// Balances responsiveness against wasted backend work during rapid
    /// typing; 500 ms matches common editor debounce behavior.
    pub validation_debounce_ms: u64,
    /// Coalescing window for typing-class bursts sharing a key.
    pub typing_coalesce_ms: u64,
    /// Republish cached diagnostics when an edit classifies as skippable,
    /// confirming client state for the new revision without backend work.
    pub publish_skipped_revisions: bool,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            validation_debounce_ms: DEFAULT_VALIDATION_DEBOUNCE_MS,
            typing_coalesce_ms: DEFAULT_TYPING_COALESCE_MS,
            publish_skipped_revisions: true,
        }
    }
}

impl CoreSettings {
    pub fn validation_debounce(&self) -> Duration {
        Duration::from_millis(self.validation_debounce_ms)
    }

    pub fn typing_coalesce(&self) -> Duration {
        Duration::from_millis(self.typing_coalesce_ms)
    }
}

/// Partial settings payload; absent fields keep their current values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub validation_debounce_ms: Option<u64>,
    pub typing_coalesce_ms: Option<u64>,
    pub publish_skipped_revisions: Option<bool>,
}

impl SettingsUpdate {
    /// Parse an editor configuration payload. `null` means "no changes".
    pub fn from_value(value: &serde_json::Value) -> CoreResult<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone())
            .map_err(|err| CoreError::config(format!("invalid settings payload: {err}")))
    }
}

/// Merge an update over existing settings, preferring values from `primary`.
pub fn merge_settings(fallback: &CoreSettings, primary: SettingsUpdate) -> CoreSettings {
    CoreSettings {
        validation_debounce_ms: primary
            .validation_debounce_ms
            .unwrap_or(fallback.validation_debounce_ms),
        typing_coalesce_ms: primary
            .typing_coalesce_ms
            .unwrap_or(fallback.typing_coalesce_ms),
        publish_skipped_revisions: primary
            .publish_skipped_revisions
            .unwrap_or(fallback.publish_skipped_revisions),
    }
}
