//! Source positions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 1-based line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub col: u32,
}

impl Position {
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Begin and end of a declaration or expression.
///
/// Renders as `begLine:begCol-endLine:endCol`, the same text the corpus
/// views produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub begin: Position,
    pub end: Position,
}

impl Span {
    pub const fn new(begin: Position, end: Position) -> Self {
        Self { begin, end }
    }

    /// Span from four raw numbers, in the order the views print them.
    pub const fn from_coords(beg_line: u32, beg_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            begin: Position::new(beg_line, beg_col),
            end: Position::new(end_line, end_col),
        }
    }

    /// The store rejects spans whose end line precedes the begin line.
    pub fn is_ordered(&self) -> bool {
        self.end.line >= self.begin.line
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.begin, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_renders_like_the_views() {
        let span = Span::from_coords(10, 1, 10, 20);
        assert_eq!(span.to_string(), "10:1-10:20");
    }

    #[test]
    fn reversed_lines_are_not_ordered() {
        assert!(Span::from_coords(3, 9, 3, 1).is_ordered());
        assert!(!Span::from_coords(4, 1, 3, 1).is_ordered());
    }
}
