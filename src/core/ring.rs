//! Ring Buffer
//!
//! Fixed-capacity circular storage of lines holding both the visible rows
//! and the scroll-back history of one screen.
//!
//! Viewport row `r` lives in physical slot `(base + r) % capacity`. History
//! rows sit directly before `base`. Scrolling the whole screen up advances
//! `base` instead of moving lines, so the row scrolled off the top becomes
//! history and the recycled slot at the bottom is the only one cleared. Once
//! the history fills every slot not used by the viewport the oldest line is
//! overwritten.
//!
//! Shrinking without a slide leaves the rows below the new viewport in
//! their slots so a later grow can show them again. They stay valid only
//! until the viewport next scrolls into them.
//!
//! Slots are only reachable through accessor methods taking logical rows.

use serde::{Deserialize, Serialize};

use super::glyph::Glyph;
use super::line::Line;

/// Circular line buffer for one screen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ring {
    lines: Vec<Line>,
    /// Physical slot of viewport row 0
    base: usize,
    /// Valid history lines above the viewport
    history: usize,
    /// Visible rows
    rows: usize,
    /// Valid rows kept directly below the viewport by a shrink
    #[serde(default)]
    hidden_below: usize,
    /// Whether lines scrolled off the top are retained
    keep_history: bool,
}

impl Ring {
    /// Create a ring of `max(capacity, rows)` blank lines `width` cells wide
    pub fn new(
        rows: usize,
        capacity: usize,
        width: usize,
        template: &Glyph,
        keep_history: bool,
    ) -> Self {
        let capacity = capacity.max(rows).max(1);
        Self {
            lines: (0..capacity).map(|_| Line::new(width, template)).collect(),
            base: 0,
            history: 0,
            rows,
            hidden_below: 0,
            keep_history,
        }
    }

    /// Total number of slots (`maxrow`)
    pub fn capacity(&self) -> usize {
        self.lines.len()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of history lines currently retained
    pub fn history(&self) -> usize {
        self.history
    }

    /// Lines ever shown and still retained (history + viewport)
    pub fn seen(&self) -> usize {
        self.history + self.rows
    }

    fn slot(&self, row: usize) -> usize {
        (self.base + row) % self.lines.len()
    }

    /// Viewport row `row`
    pub fn line(&self, row: usize) -> &Line {
        debug_assert!(row < self.rows);
        &self.lines[self.slot(row)]
    }

    pub fn line_mut(&mut self, row: usize) -> &mut Line {
        debug_assert!(row < self.rows);
        let slot = self.slot(row);
        &mut self.lines[slot]
    }

    /// Line at a viewport-relative offset: negative offsets reach into history
    pub fn line_at(&self, offset: isize) -> Option<&Line> {
        if offset >= 0 {
            let row = offset.unsigned_abs();
            return (row < self.rows).then(|| self.line(row));
        }
        let back = offset.unsigned_abs();
        if back > self.history {
            return None;
        }
        let cap = self.lines.len();
        Some(&self.lines[(self.base + cap - back) % cap])
    }

    /// Exchange two viewport rows
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        let (a, b) = (self.slot(a), self.slot(b));
        self.lines.swap(a, b);
    }

    /// Scroll rows `top..=bot` up by `n`, blanking the rows exposed at the bottom.
    ///
    /// With `copy_history` a full-screen scroll keeps the departing rows as
    /// history (when this ring keeps any).
    pub fn scroll_up(
        &mut self,
        top: usize,
        bot: usize,
        n: usize,
        template: &Glyph,
        copy_history: bool,
    ) {
        if top > bot || bot >= self.rows {
            return;
        }
        let n = n.min(bot + 1 - top);
        if n == 0 {
            return;
        }

        if copy_history && self.keep_history && top == 0 && bot + 1 == self.rows {
            let cap = self.lines.len();
            // The recycled slot splits the hidden rows from the viewport
            self.hidden_below = 0;
            for _ in 0..n {
                self.base = (self.base + 1) % cap;
                let slot = self.slot(self.rows - 1);
                self.lines[slot].clear_all(template);
                self.history = (self.history + 1).min(cap - self.rows);
            }
            return;
        }

        if bot + 1 == self.rows {
            self.hidden_below = 0;
        }
        for row in top..bot + 1 - n {
            self.swap_rows(row, row + n);
        }
        for row in bot + 1 - n..=bot {
            self.line_mut(row).clear_all(template);
        }
    }

    /// Scroll rows `top..=bot` down by `n`, blanking the rows exposed at the top
    pub fn scroll_down(&mut self, top: usize, bot: usize, n: usize, template: &Glyph) {
        if top > bot || bot >= self.rows {
            return;
        }
        let n = n.min(bot + 1 - top);
        if n == 0 {
            return;
        }

        for row in (top + n..=bot).rev() {
            self.swap_rows(row, row - n);
        }
        for row in top..top + n {
            self.line_mut(row).clear_all(template);
        }
    }

    /// Grow every line to at least `width` cells
    pub fn ensure_width(&mut self, width: usize, template: &Glyph) {
        for line in &mut self.lines {
            line.ensure_width(width, template);
        }
    }

    /// Change the visible row count.
    ///
    /// When shrinking, the viewport slides down far enough to keep row
    /// `cursor_y` visible; slid rows become history (or are discarded when
    /// history is not kept). Growing re-exposes rows hidden by an earlier
    /// shrink, as long as nothing scrolled since; any other exposed row is
    /// blank. Returns the number of rows the viewport slid.
    pub fn resize(&mut self, new_rows: usize, cursor_y: usize, template: &Glyph) -> usize {
        let new_rows = new_rows.max(1);
        let old_rows = self.rows;
        let slide = (cursor_y.min(old_rows.saturating_sub(1)) + 1).saturating_sub(new_rows);

        if new_rows < old_rows {
            self.hidden_below += old_rows - slide - new_rows;
        }

        if slide > 0 {
            let cap = self.lines.len();
            if !self.keep_history {
                for row in 0..slide {
                    self.line_mut(row).clear_all(template);
                }
            }
            self.base = (self.base + slide) % cap;
            if self.keep_history {
                self.history = (self.history + slide).min(cap - new_rows - self.hidden_below);
            }
        }

        if new_rows > self.lines.len() {
            self.grow(new_rows, template);
        }

        // Rows exposed past the free slots would show the oldest history
        let cap = self.lines.len();
        if self.history + new_rows > cap {
            let overlap = self.history + new_rows - cap;
            self.rows = new_rows;
            for row in new_rows - overlap..new_rows {
                self.line_mut(row).clear_all(template);
            }
            self.history -= overlap;
        }
        self.rows = new_rows;

        if new_rows > old_rows {
            let kept = self.hidden_below.min(new_rows - old_rows);
            for row in old_rows + kept..new_rows {
                self.line_mut(row).clear_all(template);
            }
            self.hidden_below -= kept;
        }

        slide
    }

    /// Enlarge the ring to `capacity` slots, keeping line order
    fn grow(&mut self, capacity: usize, template: &Glyph) {
        let cap = self.lines.len();
        let oldest = (self.base + cap - self.history) % cap;
        self.lines.rotate_left(oldest);
        self.base = self.history;

        let width = self.lines.first().map_or(0, Line::width);
        let at = self.history + self.rows + self.hidden_below;
        let blanks: Vec<Line> = (cap..capacity).map(|_| Line::new(width, template)).collect();
        self.lines.splice(at..at, blanks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(ring: &mut Ring, row: usize, c: char) {
        ring.line_mut(row).cells_mut()[0].u = c;
    }

    fn first(ring: &Ring, row: usize) -> char {
        ring.line(row).cells()[0].u
    }

    fn filled(rows: usize, capacity: usize) -> Ring {
        let mut ring = Ring::new(rows, capacity, 4, &Glyph::default(), true);
        for row in 0..rows {
            mark(&mut ring, row, (b'a' + row as u8) as char);
        }
        ring
    }

    #[test]
    fn test_new_ring() {
        let ring = Ring::new(3, 10, 4, &Glyph::default(), true);
        assert_eq!(ring.capacity(), 10);
        assert_eq!(ring.rows(), 3);
        assert_eq!(ring.history(), 0);
        assert_eq!(ring.seen(), 3);
        let small = Ring::new(5, 2, 4, &Glyph::default(), true);
        assert_eq!(small.capacity(), 5);
    }

    #[test]
    fn test_full_scroll_moves_into_history() {
        let mut ring = filled(3, 10);
        ring.scroll_up(0, 2, 1, &Glyph::default(), true);
        assert_eq!(first(&ring, 0), 'b');
        assert_eq!(first(&ring, 1), 'c');
        assert_eq!(first(&ring, 2), ' ');
        assert_eq!(ring.history(), 1);
        assert_eq!(ring.line_at(-1).unwrap().cells()[0].u, 'a');
        assert!(ring.line_at(-2).is_none());
    }

    #[test]
    fn test_region_scroll_keeps_outside_rows() {
        let mut ring = filled(4, 10);
        ring.scroll_up(1, 2, 1, &Glyph::default(), true);
        assert_eq!(first(&ring, 0), 'a');
        assert_eq!(first(&ring, 1), 'c');
        assert_eq!(first(&ring, 2), ' ');
        assert_eq!(first(&ring, 3), 'd');
        assert_eq!(ring.history(), 0);
    }

    #[test]
    fn test_scroll_down() {
        let mut ring = filled(4, 4);
        ring.scroll_down(0, 3, 2, &Glyph::default());
        assert_eq!(first(&ring, 0), ' ');
        assert_eq!(first(&ring, 1), ' ');
        assert_eq!(first(&ring, 2), 'a');
        assert_eq!(first(&ring, 3), 'b');
    }

    #[test]
    fn test_scroll_count_clamped_to_region() {
        let mut ring = filled(3, 3);
        ring.scroll_down(0, 2, 100, &Glyph::default());
        for row in 0..3 {
            assert_eq!(first(&ring, row), ' ');
        }
    }

    #[test]
    fn test_scroll_up_whole_region_without_history() {
        let mut ring = filled(3, 3);
        ring.scroll_up(0, 2, 3, &Glyph::default(), false);
        for row in 0..3 {
            assert_eq!(first(&ring, row), ' ');
        }
        assert_eq!(ring.history(), 0);
    }

    #[test]
    fn test_wraparound_overwrites_oldest() {
        let mut ring = filled(2, 4);
        for i in 0..10u8 {
            ring.scroll_up(0, 1, 1, &Glyph::default(), true);
            mark(&mut ring, 1, (b'0' + i) as char);
        }
        assert_eq!(ring.history(), 2);
        assert_eq!(ring.seen(), ring.capacity());
        assert_eq!(first(&ring, 1), '9');
        assert_eq!(first(&ring, 0), '8');
        assert_eq!(ring.line_at(-1).unwrap().cells()[0].u, '7');
        assert_eq!(ring.line_at(-2).unwrap().cells()[0].u, '6');
    }

    #[test]
    fn test_no_history_without_keep() {
        let mut ring = Ring::new(3, 3, 4, &Glyph::default(), false);
        ring.scroll_up(0, 2, 1, &Glyph::default(), true);
        assert_eq!(ring.history(), 0);
    }

    #[test]
    fn test_resize_shrink_keeps_cursor_row() {
        let mut ring = filled(5, 10);
        let slide = ring.resize(2, 4, &Glyph::default());
        assert_eq!(slide, 3);
        assert_eq!(first(&ring, 0), 'd');
        assert_eq!(first(&ring, 1), 'e');
        assert_eq!(ring.history(), 3);
    }

    #[test]
    fn test_resize_shrink_then_grow_restores_rows() {
        let mut ring = filled(5, 10);
        assert_eq!(ring.resize(2, 0, &Glyph::default()), 0);
        ring.resize(5, 0, &Glyph::default());
        for row in 0..5 {
            assert_eq!(first(&ring, row), (b'a' + row as u8) as char);
        }
    }

    #[test]
    fn test_scroll_after_shrink_drops_hidden_rows() {
        let mut ring = filled(5, 10);
        assert_eq!(ring.resize(2, 0, &Glyph::default()), 0);
        ring.scroll_up(0, 1, 1, &Glyph::default(), true);
        assert_eq!(first(&ring, 0), 'b');
        ring.resize(5, 1, &Glyph::default());
        assert_eq!(first(&ring, 0), 'b');
        for row in 1..5 {
            assert_eq!(first(&ring, row), ' ');
        }
        assert_eq!(ring.line_at(-1).unwrap().cells()[0].u, 'a');
    }

    #[test]
    fn test_scroll_without_history_drops_hidden_rows() {
        let mut ring = Ring::new(4, 4, 4, &Glyph::default(), false);
        for row in 0..4 {
            mark(&mut ring, row, (b'a' + row as u8) as char);
        }
        ring.resize(2, 0, &Glyph::default());
        ring.scroll_up(0, 1, 1, &Glyph::default(), true);
        ring.resize(4, 1, &Glyph::default());
        assert_eq!(first(&ring, 0), 'b');
        for row in 1..4 {
            assert_eq!(first(&ring, row), ' ');
        }
    }

    #[test]
    fn test_grow_past_capacity_keeps_hidden_rows() {
        let mut ring = filled(3, 3);
        ring.resize(1, 0, &Glyph::default());
        ring.resize(5, 0, &Glyph::default());
        assert_eq!(ring.capacity(), 5);
        assert_eq!(first(&ring, 1), 'b');
        assert_eq!(first(&ring, 2), 'c');
        assert_eq!(first(&ring, 3), ' ');
    }

    #[test]
    fn test_resize_past_capacity() {
        let mut ring = filled(3, 3);
        ring.resize(6, 0, &Glyph::default());
        assert_eq!(ring.capacity(), 6);
        assert_eq!(first(&ring, 0), 'a');
        assert_eq!(first(&ring, 2), 'c');
        assert_eq!(first(&ring, 3), ' ');
        assert_eq!(first(&ring, 5), ' ');
    }

    #[test]
    fn test_grow_clears_exposed_history() {
        let mut ring = filled(2, 3);
        ring.scroll_up(0, 1, 1, &Glyph::default(), true);
        assert_eq!(ring.history(), 1);
        ring.resize(3, 0, &Glyph::default());
        assert_eq!(ring.history(), 0);
        assert_eq!(first(&ring, 0), 'b');
        assert_eq!(first(&ring, 2), ' ');
    }
}
