//! Deterministic snapshot generation
//!
//! Snapshots capture the visible terminal state in a serializable format
//! for testing and debugging. Given the same byte stream, the terminal
//! must produce identical snapshots.

use serde::{Deserialize, Serialize};

use super::glyph::{Attr, Color, Glyph};
use super::modes::{TermMode, WinMode};

/// A snapshot of the visible terminal state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Screen dimensions
    pub cols: usize,
    pub rows: usize,
    /// Visible grid content (row-major)
    pub grid: Vec<Vec<CellSnapshot>>,
    pub cursor: CursorSnapshot,
    /// Scroll region
    pub scroll_top: usize,
    pub scroll_bottom: usize,
    pub term_mode: TermMode,
    pub win_mode: WinMode,
    /// Whether the alternate screen is shown
    pub alternate_screen: bool,
    /// Lines retained above the viewport
    pub history: usize,
}

/// Snapshot of a single cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub content: char,
    pub fg: Color,
    pub bg: Color,
    #[serde(default, skip_serializing_if = "Attr::is_empty")]
    pub attr: Attr,
    /// Cell width (0 for wide-character placeholders, 1 normal, 2 wide)
    pub width: u8,
}

impl From<&Glyph> for CellSnapshot {
    fn from(glyph: &Glyph) -> Self {
        CellSnapshot {
            content: glyph.u,
            fg: glyph.fg,
            bg: glyph.bg,
            attr: glyph.attr,
            width: glyph.width(),
        }
    }
}

/// Snapshot of cursor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorSnapshot {
    pub col: usize,
    pub row: usize,
    pub visible: bool,
    pub wrap_next: bool,
}

impl Snapshot {
    /// Convert snapshot to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse snapshot from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Text of one row without trailing blanks
    pub fn row_text(&self, row: usize) -> String {
        let Some(cells) = self.grid.get(row) else {
            return String::new();
        };
        let text: String = cells
            .iter()
            .filter(|cell| cell.width != 0)
            .map(|cell| if cell.content == '\0' { ' ' } else { cell.content })
            .collect();
        text.trim_end_matches(' ').to_string()
    }

    /// Plain text of the screen, one line per row, trailing blank rows dropped
    pub fn to_text(&self) -> String {
        let mut result = String::new();
        for row in 0..self.grid.len() {
            result.push_str(&self.row_text(row));
            result.push('\n');
        }
        while result.ends_with("\n\n") {
            result.pop();
        }
        result
    }

    /// Compare cell contents and size only
    pub fn content_equals(&self, other: &Snapshot) -> bool {
        self.cols == other.cols && self.rows == other.rows && self.grid == other.grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(rows: &[&str]) -> Snapshot {
        let grid = rows
            .iter()
            .map(|row| {
                row.chars()
                    .map(|c| CellSnapshot::from(&Glyph::new(c, Attr::empty(), Color::Default, Color::Default)))
                    .collect()
            })
            .collect();
        Snapshot {
            cols: rows.first().map_or(0, |r| r.chars().count()),
            rows: rows.len(),
            grid,
            cursor: CursorSnapshot {
                col: 0,
                row: 0,
                visible: true,
                wrap_next: false,
            },
            scroll_top: 0,
            scroll_bottom: rows.len().saturating_sub(1),
            term_mode: TermMode::WRAP | TermMode::UTF8,
            win_mode: WinMode::empty(),
            alternate_screen: false,
            history: 0,
        }
    }

    #[test]
    fn test_snapshot_to_text() {
        let snap = snapshot(&["AB  ", "C   ", "    ", "    "]);
        assert_eq!(snap.row_text(0), "AB");
        assert_eq!(snap.to_text(), "AB\nC\n");
    }

    #[test]
    fn test_snapshot_skips_wide_placeholders() {
        let mut snap = snapshot(&["x y "]);
        snap.grid[0][0].width = 2;
        snap.grid[0][1].width = 0;
        assert_eq!(snap.row_text(0), "xy");
    }

    #[test]
    fn test_snapshot_json_roundtrip() {
        let snap = snapshot(&["hi  ", "    "]);
        let json = snap.to_json().unwrap();
        let restored = Snapshot::from_json(&json).unwrap();
        assert_eq!(snap, restored);
        assert!(snap.content_equals(&restored));
    }
}
