//! Where things are in the source.
//!
//! A [`Pos`] is one point in the input and a [`Span`] the half-open byte
//! range between two of them. Both carry line and column alongside the
//! byte offset, so a diagnostic never has to rescan the source to say
//! `line:col`.

use std::cmp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Pos {
    /// Bytes consumed before this point.
    pub offset: usize,
    /// 1-based.
    pub line: usize,
    /// 1-based, counted in bytes.
    pub column: usize,
}

impl Pos {
    pub const fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    pub const fn origin() -> Self {
        Self::new(0, 1, 1)
    }

    /// Step past one input byte.
    pub fn advance(&mut self, byte: u8) {
        self.offset += 1;
        if byte == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Source region of a token, node or diagnostic. Displays as its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub const fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    pub const fn point(pos: Pos) -> Self {
        Self::new(pos, pos)
    }

    /// Smallest span covering both.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: cmp::min_by_key(self.start, other.start, |p| p.offset),
            end: cmp::max_by_key(other.end, self.end, |p| p.offset),
        }
    }

    /// Bytes covered.
    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.start.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(text: &str) -> Pos {
        let mut pos = Pos::origin();
        text.bytes().for_each(|b| pos.advance(b));
        pos
    }

    #[test]
    fn advance_tracks_lines_and_columns() {
        assert_eq!(walk("ab"), Pos::new(2, 1, 3));
        assert_eq!(walk("ab\n"), Pos::new(3, 2, 1));
        assert_eq!(walk("ab\n  x"), Pos::new(6, 2, 4));
    }

    #[test]
    fn merge_is_order_independent() {
        let a = Span::new(walk("let "), walk("let x"));
        let b = Span::new(walk("let x = "), walk("let x = 1"));
        assert_eq!(a.merge(b), b.merge(a));
        assert_eq!(a.merge(b).len(), 5);
        assert_eq!(a.merge(b).to_string(), "1:5");
    }

    #[test]
    fn point_is_empty() {
        let span = Span::point(walk("x\ny"));
        assert!(span.is_empty());
        assert_eq!(span.to_string(), "2:2");
    }
}
