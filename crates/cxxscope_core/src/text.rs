//! Source positions.
//!
//! Positions are byte offsets into the translation unit's buffer. Tokens and
//! parse-tree atoms carry a start offset; diagnostics carry a [`TextSpan`].

use std::fmt;
use std::ops::Range;

/// A byte offset from the start of the source buffer.
pub type TextPos = u32;

/// A half-open byte range `[start, start + length)`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct TextSpan {
    pub start: TextPos,
    pub length: TextPos,
}

impl TextSpan {
    #[inline]
    pub fn new(start: TextPos, length: TextPos) -> Self {
        Self { start, length }
    }

    #[inline]
    pub fn from_bounds(start: TextPos, end: TextPos) -> Self {
        debug_assert!(end >= start);
        Self {
            start,
            length: end.saturating_sub(start),
        }
    }

    #[inline]
    pub fn empty(pos: TextPos) -> Self {
        Self { start: pos, length: 0 }
    }

    #[inline]
    pub fn end(&self) -> TextPos {
        self.start + self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[inline]
    pub fn contains(&self, pos: TextPos) -> bool {
        pos >= self.start && pos < self.end()
    }

    #[inline]
    pub fn to_range(&self) -> Range<usize> {
        self.start as usize..self.end() as usize
    }

    /// Smallest span covering both.
    pub fn union(&self, other: &TextSpan) -> TextSpan {
        TextSpan::from_bounds(self.start.min(other.start), self.end().max(other.end()))
    }
}

impl fmt::Debug for TextSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end())
    }
}

impl fmt::Display for TextSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}

/// 0-based line and byte column.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LineAndColumn {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for LineAndColumn {
    /// Renders 1-based, the way compilers print locations.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// Maps byte offsets to line/column pairs.
#[derive(Debug, Clone)]
pub struct LineMap {
    line_starts: Vec<TextPos>,
}

impl LineMap {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| (i + 1) as TextPos),
        );
        Self { line_starts }
    }

    pub fn line_of(&self, pos: TextPos) -> u32 {
        match self.line_starts.binary_search(&pos) {
            Ok(line) => line as u32,
            Err(line) => (line - 1) as u32,
        }
    }

    pub fn line_and_column_of(&self, pos: TextPos) -> LineAndColumn {
        let line = self.line_of(pos);
        LineAndColumn {
            line,
            column: pos - self.line_starts[line as usize],
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_bounds() {
        let span = TextSpan::from_bounds(4, 9);
        assert_eq!(span.length, 5);
        assert!(span.contains(4));
        assert!(!span.contains(9));
        assert_eq!(span.union(&TextSpan::new(10, 2)), TextSpan::from_bounds(4, 12));
    }

    #[test]
    fn test_line_map() {
        let map = LineMap::new("namespace A {\n  int x;\n}\n");
        assert_eq!(map.line_count(), 4);
        assert_eq!(map.line_of(0), 0);
        assert_eq!(map.line_of(13), 0);
        assert_eq!(map.line_of(14), 1);
        let lc = map.line_and_column_of(20);
        assert_eq!(lc, LineAndColumn { line: 1, column: 6 });
        assert_eq!(lc.to_string(), "2:7");
    }
}
