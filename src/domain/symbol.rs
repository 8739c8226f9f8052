use serde::{Deserialize, Serialize};

use crate::domain::position::{Position, Range};

/// Kind of a symbol reported by the analysis backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Method,
    Variable,
    Constant,
    Type,
    Module,
    Other,
}

/// A named symbol with its defining range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: SymbolKind,
    pub range: Range,
}

impl SymbolInfo {
    pub fn new(name: impl Into<String>, kind: SymbolKind, range: Range) -> Self {
        Self {
            name: name.into(),
            kind,
            range,
        }
    }

    /// Position where the symbol is introduced.
    pub fn definition_position(&self) -> Position {
        self.range.start
    }
}
