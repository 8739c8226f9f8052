use serde::{Deserialize, Serialize};

/// Editor-style zero-based position within a text document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Line numbers covered by the range, end line inclusive.
    pub fn line_span(&self) -> std::ops::RangeInclusive<usize> {
        self.start.line as usize..=self.end.line as usize
    }
}
