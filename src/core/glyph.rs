//! Screen Glyph
//!
//! One cell of the screen: a code point, attribute bits and a pair of colors.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Tag bit marking a packed color as direct RGB rather than a palette index
pub const TRUECOLOR_TAG: u32 = 1 << 24;

bitflags! {
    /// Glyph attribute bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Attr: u16 {
        const BOLD      = 1 << 0;
        const FAINT     = 1 << 1;
        const ITALIC    = 1 << 2;
        const UNDERLINE = 1 << 3;
        const BLINK     = 1 << 4;
        const REVERSE   = 1 << 5;
        const INVISIBLE = 1 << 6;
        const STRUCK    = 1 << 7;
        /// Line continues on the next row (set on the last cell before a wrap)
        const WRAP      = 1 << 8;
        /// First half of a double-width character
        const WIDE      = 1 << 9;
        /// Placeholder occupying the second column of a wide character
        const WDUMMY    = 1 << 10;
        const BOLD_FAINT = Self::BOLD.bits() | Self::FAINT.bits();
    }
}

/// Cell color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Color {
    /// The embedder's default color for this position (fg or bg)
    #[default]
    Default,
    /// Palette index 0-255
    Indexed(u8),
    /// 24-bit direct color
    Rgb(u8, u8, u8),
}

impl Color {
    /// Pack into the `index | TRUECOLOR_TAG << rgb` encoding.
    ///
    /// `Default` packs to `u32::MAX`, which neither range can produce.
    pub fn to_packed(self) -> u32 {
        match self {
            Color::Default => u32::MAX,
            Color::Indexed(i) => u32::from(i),
            Color::Rgb(r, g, b) => {
                TRUECOLOR_TAG | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
            }
        }
    }

    /// Inverse of [`Color::to_packed`]; values outside both ranges are `Default`
    pub fn from_packed(v: u32) -> Self {
        if v & 0xFF00_0000 == TRUECOLOR_TAG {
            Color::Rgb((v >> 16) as u8, (v >> 8) as u8, v as u8)
        } else if v <= 0xFF {
            Color::Indexed(v as u8)
        } else {
            Color::Default
        }
    }
}

/// A single screen cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Glyph {
    /// Code point
    pub u: char,
    pub attr: Attr,
    pub fg: Color,
    pub bg: Color,
}

impl Default for Glyph {
    fn default() -> Self {
        Self {
            u: ' ',
            attr: Attr::empty(),
            fg: Color::Default,
            bg: Color::Default,
        }
    }
}

impl Glyph {
    pub fn new(u: char, attr: Attr, fg: Color, bg: Color) -> Self {
        Self { u, attr, fg, bg }
    }

    /// Blank cell carrying only the colors of `template`
    pub fn blank(template: &Glyph) -> Self {
        Self {
            u: ' ',
            attr: Attr::empty(),
            fg: template.fg,
            bg: template.bg,
        }
    }

    /// True for a blank cell (space, no visible attributes)
    pub fn is_blank(&self) -> bool {
        self.u == ' ' && !self.attr.intersects(Attr::UNDERLINE | Attr::STRUCK | Attr::REVERSE)
    }

    pub fn is_wide(&self) -> bool {
        self.attr.contains(Attr::WIDE)
    }

    pub fn is_dummy(&self) -> bool {
        self.attr.contains(Attr::WDUMMY)
    }

    /// Display width of this cell: 2 for a wide glyph, 0 for its placeholder
    pub fn width(&self) -> u8 {
        if self.is_wide() {
            2
        } else if self.is_dummy() {
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glyph_default() {
        let g = Glyph::default();
        assert_eq!(g.u, ' ');
        assert!(g.attr.is_empty());
        assert_eq!(g.fg, Color::Default);
        assert!(g.is_blank());
    }

    #[test]
    fn test_blank_keeps_colors() {
        let template = Glyph::new('x', Attr::BOLD, Color::Indexed(1), Color::Rgb(1, 2, 3));
        let blank = Glyph::blank(&template);
        assert_eq!(blank.u, ' ');
        assert!(blank.attr.is_empty());
        assert_eq!(blank.fg, Color::Indexed(1));
        assert_eq!(blank.bg, Color::Rgb(1, 2, 3));
    }

    #[test]
    fn test_color_packing() {
        assert_eq!(Color::Indexed(200).to_packed(), 200);
        assert_eq!(Color::Rgb(0x12, 0x34, 0x56).to_packed(), 0x0112_3456);
        assert_eq!(Color::from_packed(0x0112_3456), Color::Rgb(0x12, 0x34, 0x56));
        assert_eq!(Color::from_packed(7), Color::Indexed(7));
        assert_eq!(Color::from_packed(Color::Default.to_packed()), Color::Default);
    }

    #[test]
    fn test_width() {
        let mut g = Glyph::default();
        assert_eq!(g.width(), 1);
        g.attr = Attr::WIDE;
        assert_eq!(g.width(), 2);
        g.attr = Attr::WDUMMY;
        assert_eq!(g.width(), 0);
    }

    #[test]
    fn test_bold_faint_mask() {
        let mut attr = Attr::BOLD | Attr::FAINT | Attr::ITALIC;
        attr.remove(Attr::BOLD_FAINT);
        assert_eq!(attr, Attr::ITALIC);
    }
}
