use std::fmt;

use serde::{Deserialize, Serialize};

/// Priority class of a scheduled unit of work.
///
/// Declared lowest to highest so the derived ordering matches urgency:
/// `Typing > Interactive > Background`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestClass {
    /// Best-effort work such as full-document validation.
    Background,
    /// User-visible requests like hover or completion.
    Interactive,
    /// Edit application and anything else that gates keystroke latency.
    Typing,
}

impl RequestClass {
    /// Number of classes, used to size per-class tables.
    pub const COUNT: usize = 3;

    /// Classes from most to least urgent. Dequeue scans in this order.
    pub const fn in_priority_order() -> [RequestClass; Self::COUNT] {
        [Self::Typing, Self::Interactive, Self::Background]
    }

    /// Stable index for per-class tables.
    pub const fn index(self) -> usize {
        match self {
            Self::Typing => 0,
            Self::Interactive => 1,
            Self::Background => 2,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Typing => "typing",
            Self::Interactive => "interactive",
            Self::Background => "background",
        }
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
