//! Cursor state
//!
//! Position, the glyph template applied to newly written characters and the
//! origin/pending-wrap flags. Saved copies are kept per screen by the
//! terminal for DECSC/DECRC.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::glyph::Glyph;

bitflags! {
    /// Cursor flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct CursorState: u8 {
        /// The last column was written; the next printable wraps first
        const WRAPNEXT = 1 << 0;
        /// DECOM: row addressing is relative to the scroll region
        const ORIGIN   = 1 << 1;
    }
}

/// Cursor position and pending attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cursor {
    /// Template for new glyphs (attributes and colors; `u` is unused)
    pub attr: Glyph,
    /// Column (0-indexed)
    pub x: usize,
    /// Row (0-indexed)
    pub y: usize,
    pub state: CursorState,
}

impl Cursor {
    /// Cursor at the origin using `fg`/`bg` from `attr`
    pub fn new(attr: Glyph) -> Self {
        Self {
            attr,
            x: 0,
            y: 0,
            state: CursorState::empty(),
        }
    }

    pub fn wrap_next(&self) -> bool {
        self.state.contains(CursorState::WRAPNEXT)
    }

    pub fn origin(&self) -> bool {
        self.state.contains(CursorState::ORIGIN)
    }
}
