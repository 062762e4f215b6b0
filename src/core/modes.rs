//! Terminal mode flags
//!
//! [`TermMode`] holds the modes the engine itself acts on. [`WinMode`] holds
//! the modes that only matter to the embedding application (keypad, mouse,
//! reverse video, ...); the engine announces changes to those through
//! [`crate::Event::Set`] / [`crate::Event::Unset`] and keeps a mirror.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Modes interpreted by the engine
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct TermMode: u8 {
        /// DECAWM auto wrap
        const WRAP      = 1 << 0;
        /// IRM insert mode
        const INSERT    = 1 << 1;
        /// The alternate screen is active
        const ALTSCREEN = 1 << 2;
        /// LNM: LF implies CR, and sent CR becomes CRLF
        const CRLF      = 1 << 3;
        /// Local echo of sent bytes
        const ECHO      = 1 << 4;
        /// Copy output to the printer sink
        const PRINT     = 1 << 5;
        /// Decode input as UTF-8
        const UTF8      = 1 << 6;
    }
}

bitflags! {
    /// Modes owned by the embedding application
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct WinMode: u32 {
        const VISIBLE     = 1 << 0;
        const FOCUSED     = 1 << 1;
        const APPKEYPAD   = 1 << 2;
        const MOUSEBTN    = 1 << 3;
        const MOUSEMOTION = 1 << 4;
        const REVERSE     = 1 << 5;
        const KBDLOCK     = 1 << 6;
        /// Cursor hidden (DECTCEM reset)
        const HIDE        = 1 << 7;
        const APPCURSOR   = 1 << 8;
        const MOUSESGR    = 1 << 9;
        const EIGHT_BIT   = 1 << 10;
        const BLINK       = 1 << 11;
        const FBLINK      = 1 << 12;
        const FOCUS       = 1 << 13;
        const MOUSEX10    = 1 << 14;
        const MOUSEMANY   = 1 << 15;
        const BRCKTPASTE  = 1 << 16;
        const NUMLOCK     = 1 << 17;
        const MOUSE = Self::MOUSEBTN.bits()
            | Self::MOUSEMOTION.bits()
            | Self::MOUSEX10.bits()
            | Self::MOUSEMANY.bits();
    }
}

/// Character set designated into one of the G0-G3 slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Charset {
    /// US ASCII
    #[default]
    Usa,
    /// DEC special graphics (line drawing)
    Graphic0,
}

impl Charset {
    /// Translate `c` through this charset
    pub fn map(self, c: char) -> char {
        match self {
            Charset::Usa => c,
            Charset::Graphic0 => dec_graphic(c).unwrap_or(c),
        }
    }
}

/// DEC special graphics replacement for `c` (0x41..=0x7e), if it has one
pub fn dec_graphic(c: char) -> Option<char> {
    let g = match c {
        'A' => '↑',
        'B' => '↓',
        'C' => '→',
        'D' => '←',
        'E' => '█',
        'F' => '▚',
        'G' => '☃',
        '_' => ' ',
        '`' => '◆',
        'a' => '▒',
        'b' => '␉',
        'c' => '␌',
        'd' => '␍',
        'e' => '␊',
        'f' => '°',
        'g' => '±',
        'h' => '␤',
        'i' => '␋',
        'j' => '┘',
        'k' => '┐',
        'l' => '┌',
        'm' => '└',
        'n' => '┼',
        'o' => '⎺',
        'p' => '⎻',
        'q' => '─',
        'r' => '⎼',
        's' => '⎽',
        't' => '├',
        'u' => '┤',
        'v' => '┴',
        'w' => '┬',
        'x' => '│',
        'y' => '≤',
        'z' => '≥',
        '{' => 'π',
        '|' => '≠',
        '}' => '£',
        '~' => '·',
        _ => return None,
    };
    Some(g)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dec_graphic() {
        assert_eq!(dec_graphic('q'), Some('─'));
        assert_eq!(dec_graphic('x'), Some('│'));
        assert_eq!(dec_graphic('l'), Some('┌'));
        assert_eq!(dec_graphic('H'), None);
        assert_eq!(dec_graphic('1'), None);
    }

    #[test]
    fn test_charset_map() {
        assert_eq!(Charset::Usa.map('q'), 'q');
        assert_eq!(Charset::Graphic0.map('q'), '─');
        assert_eq!(Charset::Graphic0.map('Q'), 'Q');
    }

    #[test]
    fn test_mouse_mask() {
        let mut mode = WinMode::MOUSEBTN | WinMode::APPCURSOR;
        mode.remove(WinMode::MOUSE);
        assert_eq!(mode, WinMode::APPCURSOR);
    }
}
