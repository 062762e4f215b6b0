//! Parser actions
//!
//! The parser turns code points into these actions; the terminal executes
//! them. Escape-sequence parameters are parsed here so the dispatcher only
//! ever sees structured commands.

use serde::{Deserialize, Serialize};

use super::utf8::UTF_SIZ;

/// Capacity of the raw CSI buffer; longer sequences are force-terminated
pub const ESC_BUF_SIZ: usize = 128 * UTF_SIZ;
/// Maximum number of CSI parameters
pub const ESC_ARG_SIZ: usize = 16;
/// Initial size of the string-sequence buffer
pub const STR_BUF_SIZ: usize = ESC_BUF_SIZ;
/// Maximum number of string-sequence arguments
pub const STR_ARG_SIZ: usize = ESC_ARG_SIZ;

/// Actions produced by the parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write a character at the cursor
    Print(char),
    /// Execute a C0/C1 control code
    Control(char),
    /// A complete two-character escape sequence
    Esc(EscAction),
    /// A complete control sequence
    Csi(CsiSequence),
    /// A terminated OSC/DCS/APC/PM string
    Str(StrSequence),
}

/// Escape sequences the terminal acts on (`ESC x`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscAction {
    /// IND - `ESC D`
    Index,
    /// NEL - `ESC E`
    NextLine,
    /// HTS - `ESC H`
    TabSet,
    /// RI - `ESC M`
    ReverseIndex,
    /// DECID - `ESC Z`
    Identify,
    /// RIS - `ESC c`
    Reset,
    /// DECPAM - `ESC =`
    KeypadApplication,
    /// DECPNM - `ESC >`
    KeypadNumeric,
    /// DECSC - `ESC 7`
    SaveCursor,
    /// DECRC - `ESC 8`
    RestoreCursor,
    /// LS2/LS3 - `ESC n` / `ESC o`
    LockingShift(usize),
    /// `ESC ( x` .. `ESC + x`: designate a charset into slot G0..G3
    DesignateCharset { slot: usize, code: char },
    /// `ESC % x`
    Utf8Mode(char),
    /// `ESC # x`
    DecTest(char),
    /// Anything else
    Unknown(char),
}

/// A parsed control sequence: `ESC [ [?] arg ; arg ... mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsiSequence {
    /// A leading `?` was present
    pub private: bool,
    args: [i64; ESC_ARG_SIZ],
    narg: usize,
    /// Final byte and, for sequences with an intermediate, the byte after it
    pub mode: [u8; 2],
}

impl CsiSequence {
    /// Parse the raw bytes collected after `ESC [`.
    ///
    /// Parameters are decimal with an optional sign; missing digits count as
    /// 0 and an overflowing value becomes -1. Parameters past the sixteenth
    /// are dropped.
    pub fn parse(buf: &[u8]) -> Self {
        let mut csi = Self {
            private: false,
            args: [0; ESC_ARG_SIZ],
            narg: 0,
            mode: [0; 2],
        };

        let mut p = 0;
        if buf.first() == Some(&b'?') {
            csi.private = true;
            p = 1;
        }

        while p < buf.len() {
            let (v, next) = parse_long(buf, p);
            p = next;
            csi.args[csi.narg] = v;
            csi.narg += 1;
            if buf.get(p) != Some(&b';') || csi.narg == ESC_ARG_SIZ {
                break;
            }
            p += 1;
        }

        csi.mode[0] = buf.get(p).copied().unwrap_or(0);
        csi.mode[1] = buf.get(p + 1).copied().unwrap_or(0);
        csi
    }

    /// The parsed parameters
    pub fn args(&self) -> &[i64] {
        &self.args[..self.narg]
    }

    pub fn narg(&self) -> usize {
        self.narg
    }

    /// Parameter `i`, 0 when absent
    pub fn arg(&self, i: usize) -> i64 {
        self.args.get(i).copied().unwrap_or(0)
    }

    /// Parameter `i`, with absent or zero replaced by `default`
    pub fn arg_or(&self, i: usize, default: i64) -> i64 {
        match self.arg(i) {
            0 => default,
            v => v,
        }
    }

    /// Final byte
    pub fn final_byte(&self) -> u8 {
        self.mode[0]
    }
}

/// Parse a decimal number starting at `p`, returning the value and the index
/// just past it. No digits yields `(0, p)`.
fn parse_long(buf: &[u8], p: usize) -> (i64, usize) {
    let mut i = p;
    let negative = match buf.get(i) {
        Some(b'-') => {
            i += 1;
            true
        }
        Some(b'+') => {
            i += 1;
            false
        }
        _ => false,
    };

    let start = i;
    let mut value: Option<i64> = Some(0);
    while let Some(d) = buf.get(i).filter(|b| b.is_ascii_digit()) {
        value = value
            .and_then(|v| v.checked_mul(10))
            .and_then(|v| v.checked_add(i64::from(d - b'0')));
        i += 1;
    }

    if i == start {
        return (0, p);
    }
    match value {
        Some(v) if negative => (-v, i),
        Some(v) => (v, i),
        None => (-1, i),
    }
}

/// A terminated string sequence split into `;`-separated arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrSequence {
    /// Introducer: `]` OSC, `P` DCS, `_` APC, `^` PM, `k` old-style title
    pub kind: u8,
    pub args: Vec<String>,
}

impl StrSequence {
    /// Split `buf` into at most [`STR_ARG_SIZ`] arguments; an empty payload
    /// has no arguments at all
    pub fn parse(kind: u8, buf: &[u8]) -> Self {
        let args = if buf.is_empty() {
            Vec::new()
        } else {
            buf.split(|&b| b == b';')
                .take(STR_ARG_SIZ)
                .map(|arg| String::from_utf8_lossy(arg).into_owned())
                .collect()
        };
        Self { kind, args }
    }

    /// Argument `i`, if present
    pub fn arg(&self, i: usize) -> Option<&str> {
        self.args.get(i).map(String::as_str)
    }
}

/// Render raw sequence bytes for a log line
pub fn escape_for_log(prefix: &str, bytes: &[u8]) -> String {
    let mut out = String::from(prefix);
    for &b in bytes {
        match b {
            b'\n' => out.push_str("(\\n)"),
            b'\r' => out.push_str("(\\r)"),
            0x1b => out.push_str("(\\e)"),
            0x20..=0x7e => out.push(char::from(b)),
            _ => out.push_str(&format!("({b:02x})")),
        }
    }
    out
}
