pub mod diagnostic;
pub mod position;
pub mod symbol;

pub use diagnostic::{Diagnostic, Severity};
pub use position::{Position, Range};
pub use symbol::{SymbolInfo, SymbolKind};
