//! Screen line
//!
//! A row of glyphs. The backing storage only ever grows: when the screen
//! becomes narrower the extra columns are kept (hidden) so that growing back
//! restores them.

use serde::{Deserialize, Serialize};

use super::glyph::{Attr, Glyph};

/// A row of glyphs in the ring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    cells: Vec<Glyph>,
}

impl Line {
    /// Create a blank line `width` cells wide, colored like `template`
    pub fn new(width: usize, template: &Glyph) -> Self {
        Self {
            cells: vec![Glyph::blank(template); width],
        }
    }

    /// Allocated width (may exceed the visible column count)
    pub fn width(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &[Glyph] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [Glyph] {
        &mut self.cells
    }

    /// Grow the allocation to at least `width` cells, padding with blanks
    pub fn ensure_width(&mut self, width: usize, template: &Glyph) {
        if self.cells.len() < width {
            self.cells.resize(width, Glyph::blank(template));
        }
    }

    /// Blank the columns `x1..=x2` (clamped to the allocation)
    pub fn clear(&mut self, x1: usize, x2: usize, template: &Glyph) {
        let end = (x2 + 1).min(self.cells.len());
        if x1 >= end {
            return;
        }
        self.cells[x1..end].fill(Glyph::blank(template));
    }

    /// Blank the whole allocation
    pub fn clear_all(&mut self, template: &Glyph) {
        self.cells.fill(Glyph::blank(template));
    }

    /// Number of significant cells among the first `cols`.
    ///
    /// A line that wraps into the next is significant up to the last column;
    /// otherwise trailing spaces are not counted.
    pub fn len(&self, cols: usize) -> usize {
        let cols = cols.min(self.cells.len());
        if cols == 0 {
            return 0;
        }
        if self.cells[cols - 1].attr.contains(Attr::WRAP) {
            return cols;
        }
        self.cells[..cols]
            .iter()
            .rposition(|g| g.u != ' ')
            .map_or(0, |i| i + 1)
    }

    pub fn is_empty(&self, cols: usize) -> bool {
        self.len(cols) == 0
    }

    /// True if any of the first `cols` cells carries one of `attr`
    pub fn has_attr(&self, cols: usize, attr: Attr) -> bool {
        self.cells.iter().take(cols).any(|g| g.attr.intersects(attr))
    }

    /// Text of the first `cols` cells without trailing blanks.
    ///
    /// Wide-character placeholders are skipped.
    pub fn text(&self, cols: usize) -> String {
        let len = self.len(cols);
        self.cells[..len]
            .iter()
            .filter(|g| !g.is_dummy())
            .map(|g| if g.u == '\0' { ' ' } else { g.u })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::glyph::Color;

    fn line_from(s: &str) -> Line {
        let mut line = Line::new(10, &Glyph::default());
        for (i, c) in s.chars().enumerate() {
            line.cells_mut()[i].u = c;
        }
        line
    }

    #[test]
    fn test_new_line_is_blank() {
        let line = Line::new(5, &Glyph::default());
        assert_eq!(line.width(), 5);
        assert!(line.is_empty(5));
        assert_eq!(line.text(5), "");
    }

    #[test]
    fn test_len_trims_trailing_spaces() {
        let line = line_from("ab c");
        assert_eq!(line.len(10), 4);
        assert_eq!(line.len(2), 2);
        assert_eq!(line.text(10), "ab c");
    }

    #[test]
    fn test_len_of_wrapped_line_is_full() {
        let mut line = line_from("ab");
        line.cells_mut()[5].attr |= Attr::WRAP;
        assert_eq!(line.len(6), 6);
    }

    #[test]
    fn test_clear_range() {
        let mut line = line_from("abcdef");
        let template = Glyph::new('x', Attr::BOLD, Color::Indexed(1), Color::Indexed(2));
        line.clear(1, 3, &template);
        assert_eq!(line.text(10), "a   ef");
        assert_eq!(line.cells()[2].bg, Color::Indexed(2));
        assert!(line.cells()[2].attr.is_empty());
        line.clear(8, 20, &template);
        assert_eq!(line.width(), 10);
    }

    #[test]
    fn test_ensure_width_never_shrinks() {
        let mut line = line_from("abc");
        line.ensure_width(4, &Glyph::default());
        assert_eq!(line.width(), 10);
        line.ensure_width(12, &Glyph::default());
        assert_eq!(line.width(), 12);
        assert_eq!(line.text(12), "abc");
    }

    #[test]
    fn test_has_attr() {
        let mut line = line_from("abc");
        line.cells_mut()[7].attr |= Attr::UNDERLINE;
        assert!(line.has_attr(10, Attr::UNDERLINE));
        assert!(!line.has_attr(5, Attr::UNDERLINE));
    }
}
