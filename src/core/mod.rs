//! Core terminal data model
//!
//! Glyphs, lines, the ring buffer holding a screen and its history, the
//! cursor, mode flags and snapshots.

mod cursor;
mod glyph;
mod line;
mod modes;
mod ring;
mod snapshot;

pub use cursor::{Cursor, CursorState};
pub use glyph::{Attr, Color, Glyph, TRUECOLOR_TAG};
pub use line::Line;
pub use modes::{dec_graphic, Charset, TermMode, WinMode};
pub use ring::Ring;
pub use snapshot::{CellSnapshot, CursorSnapshot, Snapshot};
