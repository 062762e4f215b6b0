//! Parser State Machine
//!
//! Consumes one code point at a time and yields at most one [`Action`].
//!
//! States:
//! - Ground: normal text
//! - Escape: after ESC
//! - Csi: collecting `ESC [` parameters
//! - Str: collecting an OSC/DCS/APC/PM payload
//! - Charset / Test / Utf8: one-shot states after `ESC (`, `ESC #`, `ESC %`
//!
//! Control codes are executed in every state. A string in progress is first
//! terminated by BEL, CAN, SUB, ESC or any C1 code; the terminator then runs
//! as a control code, so BEL or `ESC \` dispatch the string while CAN and SUB
//! discard it.

use super::actions::{
    escape_for_log, Action, CsiSequence, EscAction, StrSequence, ESC_BUF_SIZ, STR_BUF_SIZ,
};
use super::utf8::{encode_char, UTF_SIZ};

/// Default upper bound for a string payload
pub const STR_BUF_LIMIT: usize = 1 << 22;

/// Parser state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    Csi,
    Str,
    Charset(usize),
    Test,
    Utf8,
}

/// C0, DEL or C1
pub fn is_control(u: u32) -> bool {
    u < 0x20 || u == 0x7f || (0x80..=0x9f).contains(&u)
}

fn is_c1(u: u32) -> bool {
    (0x80..=0x9f).contains(&u)
}

/// The escape-sequence parser
#[derive(Debug)]
pub struct Parser {
    state: State,
    /// A string was terminated and waits for ST or BEL to be dispatched
    str_end: bool,
    /// Raw bytes after `ESC [`
    csi: Vec<u8>,
    /// String introducer
    str_kind: u8,
    /// Raw string payload
    str_buf: Vec<u8>,
    /// Current logical size of the string buffer; doubles as it fills
    str_size: usize,
    str_limit: usize,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Create a new parser in the ground state
    pub fn new() -> Self {
        Self::with_str_limit(STR_BUF_LIMIT)
    }

    /// Parser whose string payloads stop growing at `limit` bytes
    pub fn with_str_limit(limit: usize) -> Self {
        Self {
            state: State::Ground,
            str_end: false,
            csi: Vec::with_capacity(ESC_BUF_SIZ),
            str_kind: 0,
            str_buf: Vec::with_capacity(STR_BUF_SIZ),
            str_size: STR_BUF_SIZ,
            str_limit: limit.max(STR_BUF_SIZ),
        }
    }

    /// True when no sequence is in progress
    pub fn is_ground(&self) -> bool {
        self.state == State::Ground
    }

    /// Printable form of the last control sequence, for log lines
    pub fn csi_dump(&self) -> String {
        escape_for_log("ESC[", &self.csi)
    }

    /// Printable form of the current string payload, for log lines
    pub fn str_dump(&self) -> String {
        let mut prefix = String::from("ESC");
        prefix.push(char::from(self.str_kind));
        let mut out = escape_for_log(&prefix, &self.str_buf);
        out.push_str("ESC\\");
        out
    }

    /// Feed one code point
    pub fn advance(&mut self, c: char) -> Option<Action> {
        let u = u32::from(c);

        if self.state == State::Str {
            if matches!(u, 0x07 | 0x18 | 0x1a | 0x1b) || is_c1(u) {
                self.state = State::Ground;
                self.str_end = true;
            } else {
                self.str_push(c);
                return None;
            }
        }

        if is_control(u) {
            return self.control(c);
        }

        match self.state {
            State::Ground => Some(Action::Print(c)),
            State::Escape => self.escape(c),
            State::Csi => {
                self.csi.push(u8::try_from(u).unwrap_or(0xff));
                if (0x40..=0x7e).contains(&u) || self.csi.len() >= ESC_BUF_SIZ - 1 {
                    self.finish();
                    Some(Action::Csi(CsiSequence::parse(&self.csi)))
                } else {
                    None
                }
            }
            State::Charset(slot) => {
                self.finish();
                Some(Action::Esc(EscAction::DesignateCharset { slot, code: c }))
            }
            State::Test => {
                self.finish();
                Some(Action::Esc(EscAction::DecTest(c)))
            }
            State::Utf8 => {
                self.finish();
                Some(Action::Esc(EscAction::Utf8Mode(c)))
            }
            // already left above
            State::Str => None,
        }
    }

    /// A sequence completed: back to ground, dropping any pending string
    fn finish(&mut self) {
        self.state = State::Ground;
        self.str_end = false;
    }

    fn control(&mut self, c: char) -> Option<Action> {
        match u32::from(c) {
            // ESC keeps a pending string terminator for `ESC \`
            0x1b => {
                self.csi.clear();
                self.state = State::Escape;
                None
            }
            0x07 => {
                if std::mem::take(&mut self.str_end) {
                    Some(Action::Str(self.take_str()))
                } else {
                    Some(Action::Control(c))
                }
            }
            0x18 | 0x1a => {
                self.csi.clear();
                self.finish();
                Some(Action::Control(c))
            }
            0x9c => std::mem::take(&mut self.str_end).then(|| Action::Str(self.take_str())),
            0x90 => self.start_str(b'P'),
            0x9d => self.start_str(b']'),
            0x9e => self.start_str(b'^'),
            0x9f => self.start_str(b'_'),
            0x08..=0x0f => Some(Action::Control(c)),
            0x00 | 0x05 | 0x11 | 0x13 | 0x7f => None,
            0x85 | 0x88 | 0x9a => {
                self.str_end = false;
                Some(Action::Control(c))
            }
            _ => {
                self.str_end = false;
                None
            }
        }
    }

    fn escape(&mut self, c: char) -> Option<Action> {
        let action = match c {
            '[' => {
                self.state = State::Csi;
                return None;
            }
            '#' => {
                self.state = State::Test;
                return None;
            }
            '%' => {
                self.state = State::Utf8;
                return None;
            }
            'P' | '_' | '^' | ']' | 'k' => return self.start_str(c as u8),
            '(' | ')' | '*' | '+' => {
                self.state = State::Charset(c as usize - '(' as usize);
                return None;
            }
            '\\' => {
                let pending = std::mem::take(&mut self.str_end);
                self.finish();
                return pending.then(|| Action::Str(self.take_str()));
            }
            'n' => EscAction::LockingShift(2),
            'o' => EscAction::LockingShift(3),
            'D' => EscAction::Index,
            'E' => EscAction::NextLine,
            'H' => EscAction::TabSet,
            'M' => EscAction::ReverseIndex,
            'Z' => EscAction::Identify,
            'c' => EscAction::Reset,
            '=' => EscAction::KeypadApplication,
            '>' => EscAction::KeypadNumeric,
            '7' => EscAction::SaveCursor,
            '8' => EscAction::RestoreCursor,
            _ => EscAction::Unknown(c),
        };
        self.finish();
        Some(Action::Esc(action))
    }

    fn start_str(&mut self, kind: u8) -> Option<Action> {
        self.str_kind = kind;
        self.str_buf.clear();
        self.str_buf.shrink_to(STR_BUF_SIZ);
        self.str_size = STR_BUF_SIZ;
        self.state = State::Str;
        None
    }

    fn str_push(&mut self, c: char) {
        let mut buf = [0u8; UTF_SIZ];
        let bytes = encode_char(c, &mut buf);

        if self.str_buf.len() + bytes.len() >= self.str_size {
            if self.str_size * 2 > self.str_limit {
                return;
            }
            self.str_size *= 2;
        }
        self.str_buf.extend_from_slice(bytes);
    }

    fn take_str(&self) -> StrSequence {
        StrSequence::parse(self.str_kind, &self.str_buf)
    }

    /// Feed a whole string, collecting the actions
    pub fn parse_str(&mut self, s: &str) -> Vec<Action> {
        s.chars().filter_map(|c| self.advance(c)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csi(actions: &[Action]) -> &CsiSequence {
        match actions {
            [Action::Csi(csi)] => csi,
            other => panic!("expected a single CSI, got {other:?}"),
        }
    }

    #[test]
    fn test_parser_print() {
        let mut parser = Parser::new();
        let actions = parser.parse_str("Hello");
        assert_eq!(actions.len(), 5);
        assert_eq!(actions[0], Action::Print('H'));
        assert_eq!(actions[4], Action::Print('o'));
    }

    #[test]
    fn test_parser_c0_controls() {
        let mut parser = Parser::new();
        let actions = parser.parse_str("A\nB\rC");
        assert_eq!(
            actions,
            vec![
                Action::Print('A'),
                Action::Control('\n'),
                Action::Print('B'),
                Action::Control('\r'),
                Action::Print('C'),
            ]
        );
    }

    #[test]
    fn test_parser_csi_cursor_up() {
        let mut parser = Parser::new();
        let actions = parser.parse_str("\x1b[5A");
        let csi = csi(&actions);
        assert_eq!(csi.args(), &[5]);
        assert_eq!(csi.final_byte(), b'A');
        assert!(parser.is_ground());
    }

    #[test]
    fn test_parser_control_inside_csi() {
        let mut parser = Parser::new();
        let actions = parser.parse_str("\x1b[1\n2A");
        assert_eq!(actions[0], Action::Control('\n'));
        match &actions[1] {
            Action::Csi(csi) => assert_eq!(csi.args(), &[12]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parser_csi_force_terminated() {
        let mut parser = Parser::new();
        let mut input = String::from("\x1b[");
        input.push_str(&"1".repeat(ESC_BUF_SIZ * 2));
        let actions = parser.parse_str(&input);
        assert_eq!(actions.iter().filter(|a| matches!(a, Action::Csi(_))).count(), 1);
        // the remaining digits print as text
        assert!(actions.iter().any(|a| *a == Action::Print('1')));
        assert!(parser.is_ground());
    }

    #[test]
    fn test_parser_esc_actions() {
        let mut parser = Parser::new();
        assert_eq!(
            parser.parse_str("\x1b7\x1b8\x1bM\x1b>"),
            vec![
                Action::Esc(EscAction::SaveCursor),
                Action::Esc(EscAction::RestoreCursor),
                Action::Esc(EscAction::ReverseIndex),
                Action::Esc(EscAction::KeypadNumeric),
            ]
        );
        assert_eq!(
            parser.parse_str("\x1b(0\x1b%G\x1b#8"),
            vec![
                Action::Esc(EscAction::DesignateCharset { slot: 0, code: '0' }),
                Action::Esc(EscAction::Utf8Mode('G')),
                Action::Esc(EscAction::DecTest('8')),
            ]
        );
    }

    #[test]
    fn test_parser_osc_bel() {
        let mut parser = Parser::new();
        let actions = parser.parse_str("\x1b]0;title\x07X");
        assert_eq!(
            actions,
            vec![
                Action::Str(StrSequence {
                    kind: b']',
                    args: vec!["0".into(), "title".into()],
                }),
                Action::Print('X'),
            ]
        );
    }

    #[test]
    fn test_parser_osc_st() {
        let mut parser = Parser::new();
        let actions = parser.parse_str("\x1b]2;hi\x1b\\");
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            Action::Str(s) => assert_eq!(s.arg(1), Some("hi")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(parser.is_ground());
    }

    #[test]
    fn test_parser_osc_c1_st() {
        let mut parser = Parser::new();
        let actions = parser.parse_str("\u{9d}2;hi\u{9c}");
        assert!(matches!(&actions[..], [Action::Str(s)] if s.kind == b']'));
    }

    #[test]
    fn test_parser_string_aborted_by_can() {
        let mut parser = Parser::new();
        let actions = parser.parse_str("\x1b]0;title\x18X");
        assert_eq!(actions, vec![Action::Control('\x18'), Action::Print('X')]);
    }

    #[test]
    fn test_parser_string_then_other_escape_discards() {
        let mut parser = Parser::new();
        let actions = parser.parse_str("\x1b]0;t\x1b[A");
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], Action::Csi(_)));
        // a later ST has nothing left to dispatch
        assert!(parser.parse_str("\x1b\\").is_empty());
    }

    #[test]
    fn test_parser_string_keeps_c0() {
        let mut parser = Parser::new();
        let actions = parser.parse_str("\x1bPa\nb\x1b\\");
        match &actions[..] {
            [Action::Str(s)] => {
                assert_eq!(s.kind, b'P');
                assert_eq!(s.arg(0), Some("a\nb"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parser_string_growth_capped() {
        let mut parser = Parser::with_str_limit(STR_BUF_SIZ * 2);
        let mut input = String::from("\x1b]");
        input.push_str(&"x".repeat(STR_BUF_SIZ * 8));
        input.push('\x07');
        let actions = parser.parse_str(&input);
        match &actions[..] {
            [Action::Str(s)] => {
                let len = s.arg(0).map_or(0, str::len);
                assert!(len < STR_BUF_SIZ * 2);
                assert!(len > STR_BUF_SIZ);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parser_unknown_escape() {
        let mut parser = Parser::new();
        assert_eq!(
            parser.parse_str("\x1bQ"),
            vec![Action::Esc(EscAction::Unknown('Q'))]
        );
        assert!(parser.is_ground());
    }

    #[test]
    fn test_parser_dumps() {
        let mut parser = Parser::new();
        parser.parse_str("\x1b[?25h");
        assert_eq!(parser.csi_dump(), "ESC[?25h");
        parser.parse_str("\x1b]0;x\x07");
        assert_eq!(parser.str_dump(), "ESC]0;xESC\\");
    }
}
