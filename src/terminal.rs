//! Terminal Executor
//!
//! Ties together the parser and the screen model: every code point written
//! by the child goes through [`Terminal::process`], is classified by the
//! [`Parser`] and the resulting action is applied to the active screen.
//! Replies to the child (DA, DSR) are queued in an output buffer that the
//! session drains; everything the engine cannot act on itself is reported
//! through the [`EventHandler`].

use std::fmt;
use std::io::Write;

use unicode_width::UnicodeWidthChar;

use crate::app::TerminalConfig;
use crate::core::{
    Attr, CellSnapshot, Charset, Color, Cursor, CursorSnapshot, CursorState, Glyph, Ring,
    Snapshot, TermMode, WinMode,
};
use crate::event::{Event, EventHandler, EventResult};
use crate::parser::{base64, is_control, utf8, Action, CsiSequence, EscAction, Parser, StrSequence};

/// REP never repeats more often than this
const REP_LIMIT: i64 = u16::MAX as i64;

/// Convert a (possibly negative) count into a usize
fn count(n: i64) -> usize {
    usize::try_from(n.max(0)).unwrap_or(usize::MAX)
}

/// C `atoi`: optional sign and leading digits, anything else is 0
fn atoi(s: &str) -> i64 {
    let s = s.trim_start();
    let (neg, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        value = value.saturating_mul(10).saturating_add(i64::from(b - b'0'));
    }
    if neg {
        -value
    } else {
        value
    }
}

/// The emulation engine: screens, cursor, modes and the parser feeding them
pub struct Terminal<H: EventHandler> {
    cols: usize,
    rows: usize,
    /// Widest column count ever used; line allocations never shrink below it
    maxcol: usize,
    /// Active screen
    screen: Ring,
    /// Inactive screen, if an alternate screen was requested
    alt: Option<Ring>,
    dirty: Vec<bool>,
    cursor: Cursor,
    /// DECSC slots: primary, alternate
    saved: [Cursor; 2],
    /// Scroll region
    top: usize,
    bot: usize,
    mode: TermMode,
    /// Last state announced through `Set`/`Unset`
    win_mode: WinMode,
    trantbl: [Charset; 4],
    charset: usize,
    tabs: Vec<bool>,
    tab_width: usize,
    default_attr: Glyph,
    parser: Parser,
    /// Last printed character, repeated by REP
    lastc: Option<char>,
    vtiden: Vec<u8>,
    /// Bytes waiting to be written to the child
    output: Vec<u8>,
    printer: Option<Box<dyn Write>>,
    handler: H,
}

impl<H: EventHandler> fmt::Debug for Terminal<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Terminal")
            .field("cols", &self.cols)
            .field("rows", &self.rows)
            .field("cursor", &self.cursor)
            .field("scroll_region", &(self.top, self.bot))
            .field("mode", &self.mode)
            .field("win_mode", &self.win_mode)
            .field("pending_output", &self.output.len())
            .finish_non_exhaustive()
    }
}

impl<H: EventHandler> Terminal<H> {
    /// Create a terminal from configuration, reporting events to `handler`
    pub fn new(config: &TerminalConfig, handler: H) -> Self {
        let cols = config.cols.max(1);
        let rows = config.rows.max(1);
        let default_attr = Glyph::new(' ', Attr::empty(), config.default_fg, config.default_bg);

        let mut term = Self {
            cols,
            rows,
            maxcol: cols,
            screen: Ring::new(rows, config.scrollback, cols, &default_attr, true),
            alt: config
                .alt_screen
                .then(|| Ring::new(rows, rows, cols, &default_attr, false)),
            dirty: vec![true; rows],
            cursor: Cursor::new(default_attr),
            saved: [Cursor::new(default_attr); 2],
            top: 0,
            bot: rows - 1,
            mode: TermMode::empty(),
            win_mode: WinMode::empty(),
            trantbl: [Charset::Usa; 4],
            charset: 0,
            tabs: vec![false; cols],
            tab_width: config.tab_width,
            default_attr,
            parser: Parser::new(),
            lastc: None,
            vtiden: config.vtiden.as_bytes().to_vec(),
            output: Vec::new(),
            printer: None,
            handler,
        };
        term.reset();
        term
    }

    /// Create a terminal of the given size with default settings
    pub fn with_size(cols: usize, rows: usize, handler: H) -> Self {
        Self::new(&TerminalConfig::with_size(cols, rows), handler)
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Process bytes written by the child.
    ///
    /// Returns the number of bytes consumed. In UTF-8 mode a multi-byte
    /// sequence cut off at the end of `data` is left unconsumed; the caller
    /// keeps it and prefixes it to the next call.
    pub fn process(&mut self, data: &[u8]) -> usize {
        self.write_bytes(data, false)
    }

    fn write_bytes(&mut self, data: &[u8], show_ctrl: bool) -> usize {
        let mut n = 0;
        while n < data.len() {
            let (c, len) = if self.mode.contains(TermMode::UTF8) {
                match utf8::decode(&data[n..]) {
                    utf8::Decoded::Char(c, len) => (c, len),
                    utf8::Decoded::Incomplete(_) => break,
                }
            } else {
                (char::from(data[n]), 1)
            };
            n += len;

            let u = u32::from(c);
            if show_ctrl && is_control(u) {
                if u & 0x80 != 0 {
                    self.put_char('^');
                    self.put_char('[');
                    self.put_char(char::from(((u & 0x7f) ^ 0x40) as u8));
                    continue;
                } else if !matches!(c, '\n' | '\r' | '\t') {
                    self.put_char('^');
                    self.put_char(char::from((u ^ 0x40) as u8));
                    continue;
                }
            }
            self.put_char(c);
        }
        n
    }

    /// Handle one decoded code point
    fn put_char(&mut self, c: char) {
        let u = u32::from(c);
        let control = is_control(u);
        let width = if u < 127 || !self.mode.contains(TermMode::UTF8) {
            1
        } else {
            match c.width() {
                Some(w) => w,
                None => {
                    if self.mode.contains(TermMode::PRINT) && !control {
                        self.printer_write(&[0xef, 0xbf, 0xbd]);
                    }
                    1
                }
            }
        };

        if self.mode.contains(TermMode::PRINT) {
            let mut buf = [0u8; utf8::UTF_SIZ];
            let bytes = utf8::encode_char(c, &mut buf).to_vec();
            self.printer_write(&bytes);
        }

        let Some(action) = self.parser.advance(c) else {
            if control && self.parser.is_ground() {
                self.lastc = None;
            }
            return;
        };
        match action {
            Action::Print(c) => self.print(c, width),
            Action::Control(c) => self.execute_control(c),
            Action::Esc(esc) => self.execute_esc(esc),
            Action::Csi(csi) => self.execute_csi(&csi),
            Action::Str(seq) => self.execute_str(&seq),
        }
        if control && self.parser.is_ground() {
            self.lastc = None;
        }
    }

    /// Write a printable character at the cursor
    fn print(&mut self, c: char, width: usize) {
        if self.mode.contains(TermMode::WRAP) && self.cursor.wrap_next() {
            let (x, y) = (self.cursor.x, self.cursor.y);
            self.screen.line_mut(y).cells_mut()[x].attr.insert(Attr::WRAP);
            self.newline(true);
        }

        if self.mode.contains(TermMode::INSERT) && self.cursor.x + width < self.cols {
            let (x, y, cols) = (self.cursor.x, self.cursor.y, self.cols);
            self.screen
                .line_mut(y)
                .cells_mut()
                .copy_within(x..cols - width, x + width);
        }

        if self.cursor.x + width > self.cols {
            self.newline(true);
        }

        let (x, y) = (self.cursor.x, self.cursor.y);
        let template = self.cursor.attr;
        self.set_char(c, template, x, y);

        if width == 2 {
            let cols = self.cols;
            let cells = self.screen.line_mut(y).cells_mut();
            cells[x].attr.insert(Attr::WIDE);
            if x + 1 < cols {
                if cells[x + 1].is_wide() && x + 2 < cells.len() {
                    cells[x + 2].u = ' ';
                    cells[x + 2].attr.remove(Attr::WDUMMY);
                }
                cells[x + 1] = Glyph::new(' ', Attr::WDUMMY, template.fg, template.bg);
            }
        }

        if x + width < self.cols {
            self.move_to((x + width) as i64, y as i64);
        } else {
            self.cursor.state.insert(CursorState::WRAPNEXT);
        }
        self.lastc = Some(c);
    }

    /// Store `c` with the attributes of `attr` at (`x`, `y`). Positions
    /// outside the screen are ignored.
    pub fn set_char(&mut self, c: char, attr: Glyph, x: usize, y: usize) {
        if x >= self.cols || y >= self.rows {
            return;
        }
        let c = if (0x41..=0x7e).contains(&u32::from(c)) {
            self.trantbl[self.charset].map(c)
        } else {
            c
        };

        self.dirty[y] = true;
        let cells = self.screen.line_mut(y).cells_mut();
        if cells[x].is_wide() {
            if let Some(next) = cells.get_mut(x + 1) {
                next.u = ' ';
                next.attr.remove(Attr::WDUMMY);
            }
        } else if cells[x].is_dummy() && x > 0 {
            cells[x - 1].u = ' ';
            cells[x - 1].attr.remove(Attr::WIDE);
        }
        cells[x] = Glyph { u: c, ..attr };
    }

    fn newline(&mut self, first_col: bool) {
        let mut y = self.cursor.y;
        if y == self.bot {
            self.scroll_up(self.top, 1, true);
        } else {
            y += 1;
        }
        let x = if first_col { 0 } else { self.cursor.x };
        self.move_to(x as i64, y as i64);
    }

    /// Move the cursor, clamping into the screen (or the scroll region in
    /// origin mode). Clears a pending wrap.
    pub fn move_to(&mut self, x: i64, y: i64) {
        let (miny, maxy) = if self.cursor.origin() {
            (self.top, self.bot)
        } else {
            (0, self.rows - 1)
        };
        self.cursor.state.remove(CursorState::WRAPNEXT);
        self.cursor.x = x.clamp(0, self.cols as i64 - 1) as usize;
        self.cursor.y = y.clamp(miny as i64, maxy as i64) as usize;
    }

    /// Like [`Self::move_to`], with `y` relative to the region top in origin mode
    pub fn move_absolute(&mut self, x: i64, y: i64) {
        let offset = if self.cursor.origin() { self.top as i64 } else { 0 };
        self.move_to(x, y.saturating_add(offset));
    }

    /// Scroll rows `orig..=bot` of the region up by `n`. With `copy_history`
    /// a full-screen scroll on the primary screen keeps the rows in history.
    pub fn scroll_up(&mut self, orig: usize, n: i64, copy_history: bool) {
        let template = self.cursor.attr;
        self.screen
            .scroll_up(orig, self.bot, count(n), &template, copy_history);
        self.set_dirty(orig, self.bot);
    }

    /// Scroll rows `orig..=bot` of the region down by `n`
    pub fn scroll_down(&mut self, orig: usize, n: i64) {
        let template = self.cursor.attr;
        self.screen.scroll_down(orig, self.bot, count(n), &template);
        self.set_dirty(orig, self.bot);
    }

    /// Blank a rectangle (corners in any order, clamped to the allocation)
    pub fn clear_region(&mut self, x1: i64, y1: i64, x2: i64, y2: i64) {
        let (x1, x2) = if x1 > x2 { (x2, x1) } else { (x1, x2) };
        let (y1, y2) = if y1 > y2 { (y2, y1) } else { (y1, y2) };
        let maxx = self.maxcol as i64 - 1;
        let maxy = self.rows as i64 - 1;
        let (x1, x2) = (x1.clamp(0, maxx) as usize, x2.clamp(0, maxx) as usize);
        let (y1, y2) = (y1.clamp(0, maxy) as usize, y2.clamp(0, maxy) as usize);

        let template = self.cursor.attr;
        for y in y1..=y2 {
            self.dirty[y] = true;
            self.screen.line_mut(y).clear(x1, x2, &template);
        }
    }

    fn insert_blank(&mut self, n: i64) {
        let (x, y) = (self.cursor.x, self.cursor.y);
        let n = count(n).min(self.cols - x);
        if n == 0 {
            return;
        }
        let cols = self.cols;
        self.screen
            .line_mut(y)
            .cells_mut()
            .copy_within(x..cols - n, x + n);
        self.clear_region(x as i64, y as i64, (x + n - 1) as i64, y as i64);
    }

    fn delete_char(&mut self, n: i64) {
        let (x, y) = (self.cursor.x, self.cursor.y);
        let n = count(n).min(self.cols - x);
        if n == 0 {
            return;
        }
        let cols = self.cols;
        self.screen
            .line_mut(y)
            .cells_mut()
            .copy_within(x + n..cols, x);
        self.clear_region((cols - n) as i64, y as i64, cols as i64 - 1, y as i64);
    }

    fn insert_blank_line(&mut self, n: i64) {
        if (self.top..=self.bot).contains(&self.cursor.y) {
            self.scroll_down(self.cursor.y, n);
        }
    }

    fn delete_line(&mut self, n: i64) {
        if (self.top..=self.bot).contains(&self.cursor.y) {
            self.scroll_up(self.cursor.y, n, false);
        }
    }

    /// Move `n` tab stops forward (or backward when negative)
    fn put_tab(&mut self, n: i64) {
        let cols = self.cols;
        let mut x = self.cursor.x;
        let mut n = n;
        if n > 0 {
            while x < cols && n > 0 {
                n -= 1;
                x += 1;
                while x < cols && !self.tabs[x] {
                    x += 1;
                }
            }
        } else {
            while x > 0 && n < 0 {
                n += 1;
                x -= 1;
                while x > 0 && !self.tabs[x] {
                    x -= 1;
                }
            }
        }
        self.cursor.x = x.min(cols - 1);
    }

    fn set_scroll(&mut self, top: i64, bot: i64) {
        let maxy = self.rows as i64 - 1;
        let top = top.clamp(0, maxy) as usize;
        let bot = bot.clamp(0, maxy) as usize;
        let (top, bot) = if top > bot { (bot, top) } else { (top, bot) };
        self.top = top;
        self.bot = bot;
    }

    /// DECSC into the slot of the active screen
    pub fn save_cursor(&mut self) {
        let slot = usize::from(self.mode.contains(TermMode::ALTSCREEN));
        self.saved[slot] = self.cursor;
    }

    pub fn restore_cursor(&mut self) {
        let slot = usize::from(self.mode.contains(TermMode::ALTSCREEN));
        self.cursor = self.saved[slot];
        let (x, y) = (self.cursor.x as i64, self.cursor.y as i64);
        self.move_to(x, y);
    }

    /// Exchange the primary and alternate screens
    pub fn swap_screen(&mut self) {
        let Some(alt) = self.alt.as_mut() else {
            return;
        };
        std::mem::swap(&mut self.screen, alt);
        self.mode.toggle(TermMode::ALTSCREEN);
        self.full_dirty();
    }

    /// Reset to the power-on state. Scroll-back history is kept.
    pub fn reset(&mut self) {
        if self.mode.contains(TermMode::ALTSCREEN) {
            self.swap_screen();
        }

        self.cursor = Cursor::new(self.default_attr);
        self.tabs.fill(false);
        if self.tab_width > 0 {
            for x in (self.tab_width..self.cols).step_by(self.tab_width) {
                self.tabs[x] = true;
            }
        }
        self.top = 0;
        self.bot = self.rows - 1;
        self.mode = TermMode::WRAP | TermMode::UTF8;
        self.win_mode = WinMode::empty();
        self.trantbl = [Charset::Usa; 4];
        self.charset = 0;
        self.lastc = None;

        let (cols, rows) = (self.cols as i64, self.rows as i64);
        for _ in 0..2 {
            self.move_to(0, 0);
            self.save_cursor();
            self.clear_region(0, 0, cols - 1, rows - 1);
            if self.alt.is_none() {
                break;
            }
            self.swap_screen();
        }
    }

    /// Announce an application mode change, keeping the mirror current
    fn set_win_mode(&mut self, mode: WinMode, set: bool) {
        let reverse = self.win_mode.contains(WinMode::REVERSE);
        self.win_mode.set(mode, set);
        let event = if set {
            Event::Set(mode)
        } else {
            Event::Unset(mode)
        };
        self.handler.handle(event);
        if self.win_mode.contains(WinMode::REVERSE) != reverse {
            self.full_dirty();
        }
    }

    fn execute_control(&mut self, c: char) {
        let (x, y) = (self.cursor.x as i64, self.cursor.y as i64);
        match c {
            '\t' => self.put_tab(1),
            '\x08' => self.move_to(x - 1, y),
            '\r' => self.move_to(0, y),
            '\x0c' | '\x0b' | '\n' => self.newline(self.mode.contains(TermMode::CRLF)),
            '\x07' => {
                self.handler.handle(Event::Bell);
            }
            '\x0e' => self.charset = 1,
            '\x0f' => self.charset = 0,
            '\x1a' => {
                let template = self.cursor.attr;
                self.set_char('?', template, self.cursor.x, self.cursor.y);
            }
            '\u{85}' => self.newline(true),
            '\u{88}' => self.tabs[self.cursor.x] = true,
            '\u{9a}' => self.send_identification(),
            _ => {}
        }
    }

    fn execute_esc(&mut self, esc: EscAction) {
        let (x, y) = (self.cursor.x as i64, self.cursor.y as i64);
        match esc {
            EscAction::Index => {
                if self.cursor.y == self.bot {
                    self.scroll_up(self.top, 1, true);
                } else {
                    self.move_to(x, y + 1);
                }
            }
            EscAction::NextLine => self.newline(true),
            EscAction::TabSet => self.tabs[self.cursor.x] = true,
            EscAction::ReverseIndex => {
                if self.cursor.y == self.top {
                    self.scroll_down(self.top, 1);
                } else {
                    self.move_to(x, y - 1);
                }
            }
            EscAction::Identify => self.send_identification(),
            EscAction::Reset => {
                self.reset();
                self.handler.handle(Event::Reset);
            }
            EscAction::KeypadApplication => self.set_win_mode(WinMode::APPKEYPAD, true),
            EscAction::KeypadNumeric => self.set_win_mode(WinMode::APPKEYPAD, false),
            EscAction::SaveCursor => self.save_cursor(),
            EscAction::RestoreCursor => self.restore_cursor(),
            EscAction::LockingShift(n) => self.charset = n,
            EscAction::DesignateCharset { slot, code } => match code {
                '0' => self.trantbl[slot] = Charset::Graphic0,
                'B' => self.trantbl[slot] = Charset::Usa,
                _ => tracing::debug!("esc unhandled charset: ESC ( {}", code),
            },
            EscAction::Utf8Mode('G') => self.mode.insert(TermMode::UTF8),
            EscAction::Utf8Mode('@') => self.mode.remove(TermMode::UTF8),
            EscAction::Utf8Mode(_) => {}
            EscAction::DecTest('8') => {
                let template = self.cursor.attr;
                for y in 0..self.rows {
                    for x in 0..self.cols {
                        self.set_char('E', template, x, y);
                    }
                }
            }
            EscAction::DecTest(_) => {}
            EscAction::Unknown(c) => {
                tracing::debug!("erresc: unknown sequence ESC 0x{:02X} '{}'", u32::from(c), c);
            }
        }
    }

    fn execute_csi(&mut self, csi: &CsiSequence) {
        let (x, y) = (self.cursor.x as i64, self.cursor.y as i64);
        let n = csi.arg_or(0, 1);

        match csi.final_byte() {
            b'@' => self.insert_blank(n),
            b'A' => self.move_to(x, y.saturating_sub(n)),
            b'B' | b'e' => self.move_to(x, y.saturating_add(n)),
            b'i' => match csi.arg(0) {
                0 => self.print_screen(),
                1 => self.dump_line(self.cursor.y),
                2 => {}
                4 => self.mode.remove(TermMode::PRINT),
                5 => self.mode.insert(TermMode::PRINT),
                _ => {}
            },
            b'c' => {
                if csi.arg(0) == 0 {
                    self.send_identification();
                }
            }
            b'b' => {
                if let Some(c) = self.lastc {
                    for _ in 0..n.clamp(0, REP_LIMIT) {
                        self.put_char(c);
                    }
                }
            }
            b'C' | b'a' => self.move_to(x.saturating_add(n), y),
            b'D' => self.move_to(x.saturating_sub(n), y),
            b'E' => self.move_to(0, y.saturating_add(n)),
            b'F' => self.move_to(0, y.saturating_sub(n)),
            b'g' => match csi.arg(0) {
                0 => self.tabs[self.cursor.x] = false,
                3 => self.tabs.fill(false),
                _ => self.csi_unknown(),
            },
            b'G' | b'`' => self.move_to(n - 1, y),
            b'H' | b'f' => self.move_absolute(csi.arg_or(1, 1) - 1, csi.arg_or(0, 1) - 1),
            b'I' => self.put_tab(n),
            b'J' => {
                let (maxx, maxy) = (self.maxcol as i64 - 1, self.rows as i64 - 1);
                match csi.arg(0) {
                    0 => {
                        self.clear_region(x, y, maxx, y);
                        if y < maxy {
                            self.clear_region(0, y + 1, maxx, maxy);
                        }
                    }
                    1 => {
                        if y > 0 {
                            self.clear_region(0, 0, maxx, y - 1);
                        }
                        self.clear_region(0, y, x, y);
                    }
                    2 => self.clear_region(0, 0, maxx, maxy),
                    _ => self.csi_unknown(),
                }
            }
            b'K' => {
                let maxx = self.cols as i64 - 1;
                match csi.arg(0) {
                    0 => self.clear_region(x, y, maxx, y),
                    1 => self.clear_region(0, y, x, y),
                    2 => self.clear_region(0, y, maxx, y),
                    _ => {}
                }
            }
            b'S' => self.scroll_up(self.top, n, false),
            b'T' => self.scroll_down(self.top, n),
            b'L' => self.insert_blank_line(n),
            b'l' => self.set_mode(csi.private, false, csi.args()),
            b'M' => self.delete_line(n),
            b'X' => self.clear_region(x, y, x.saturating_add(n) - 1, y),
            b'P' => self.delete_char(n),
            b'Z' => self.put_tab(n.saturating_neg()),
            b'd' => self.move_absolute(x, n - 1),
            b'h' => self.set_mode(csi.private, true, csi.args()),
            b'm' => self.set_attr(csi.args()),
            b'n' => match csi.arg(0) {
                5 => self.send(b"\x1b[0n", false),
                6 => {
                    let report = format!("\x1b[{};{}R", y + 1, x + 1);
                    self.send(report.as_bytes(), false);
                }
                _ => {}
            },
            b'r' => {
                if csi.private {
                    self.csi_unknown();
                } else {
                    let top = csi.arg_or(0, 1);
                    let bot = csi.arg_or(1, self.rows as i64);
                    self.set_scroll(top - 1, bot - 1);
                    self.move_absolute(0, 0);
                }
            }
            b's' => self.save_cursor(),
            b'u' => self.restore_cursor(),
            b' ' if csi.mode[1] == b'q' => {
                self.handler.handle(Event::CursorStyle(csi.arg(0)));
            }
            _ => self.csi_unknown(),
        }
    }

    fn csi_unknown(&mut self) {
        let dump = self.parser.csi_dump();
        tracing::debug!("erresc: unknown csi {}", dump);
        self.handler.handle(Event::CsiError(dump));
    }

    /// SM / RM
    fn set_mode(&mut self, private: bool, set: bool, args: &[i64]) {
        for &arg in args {
            if private {
                self.set_private_mode(arg, set);
                continue;
            }
            match arg {
                0 => {}
                2 => self.set_win_mode(WinMode::KBDLOCK, set),
                4 => self.mode.set(TermMode::INSERT, set),
                12 => self.mode.set(TermMode::ECHO, !set),
                20 => self.mode.set(TermMode::CRLF, set),
                _ => tracing::debug!("erresc: unknown set/reset mode {}", arg),
            }
        }
    }

    fn set_private_mode(&mut self, arg: i64, set: bool) {
        match arg {
            1 => self.set_win_mode(WinMode::APPCURSOR, set),
            5 => self.set_win_mode(WinMode::REVERSE, set),
            6 => {
                self.cursor.state.set(CursorState::ORIGIN, set);
                self.move_absolute(0, 0);
            }
            7 => self.mode.set(TermMode::WRAP, set),
            0 | 2 | 3 | 4 | 8 | 12 | 18 | 19 | 42 => {}
            25 => self.set_win_mode(WinMode::HIDE, !set),
            9 | 1000 | 1002 | 1003 => {
                let bit = match arg {
                    9 => WinMode::MOUSEX10,
                    1000 => WinMode::MOUSEBTN,
                    1002 => WinMode::MOUSEMOTION,
                    _ => WinMode::MOUSEMANY,
                };
                self.handler.handle(Event::PointerMotion(set && arg == 1003));
                self.set_win_mode(WinMode::MOUSE, false);
                self.set_win_mode(bit, set);
            }
            1004 => self.set_win_mode(WinMode::FOCUS, set),
            1006 => self.set_win_mode(WinMode::MOUSESGR, set),
            1034 => self.set_win_mode(WinMode::EIGHT_BIT, set),
            1049 | 47 | 1047 => {
                if self.alt.is_none() {
                    return;
                }
                if arg == 1049 {
                    self.save_or_restore(set);
                }
                let alt = self.mode.contains(TermMode::ALTSCREEN);
                if alt {
                    let (cols, rows) = (self.cols as i64, self.rows as i64);
                    self.clear_region(0, 0, cols - 1, rows - 1);
                }
                if set != alt {
                    self.swap_screen();
                }
                if arg == 1049 {
                    self.save_or_restore(set);
                }
            }
            1048 => self.save_or_restore(set),
            2004 => self.set_win_mode(WinMode::BRCKTPASTE, set),
            1001 | 1005 | 1015 => {}
            _ => tracing::debug!("erresc: unknown private set/reset mode {}", arg),
        }
    }

    fn save_or_restore(&mut self, save: bool) {
        if save {
            self.save_cursor();
        } else {
            self.restore_cursor();
        }
    }

    /// SGR
    pub fn set_attr(&mut self, args: &[i64]) {
        let attr = &mut self.cursor.attr;
        let mut i = 0;
        while i < args.len() {
            match args[i] {
                0 => {
                    attr.attr.remove(
                        Attr::BOLD
                            | Attr::FAINT
                            | Attr::ITALIC
                            | Attr::UNDERLINE
                            | Attr::BLINK
                            | Attr::REVERSE
                            | Attr::INVISIBLE
                            | Attr::STRUCK,
                    );
                    attr.fg = self.default_attr.fg;
                    attr.bg = self.default_attr.bg;
                }
                1 => attr.attr.insert(Attr::BOLD),
                2 => attr.attr.insert(Attr::FAINT),
                3 => attr.attr.insert(Attr::ITALIC),
                4 => attr.attr.insert(Attr::UNDERLINE),
                5 | 6 => attr.attr.insert(Attr::BLINK),
                7 => attr.attr.insert(Attr::REVERSE),
                8 => attr.attr.insert(Attr::INVISIBLE),
                9 => attr.attr.insert(Attr::STRUCK),
                22 => attr.attr.remove(Attr::BOLD | Attr::FAINT),
                23 => attr.attr.remove(Attr::ITALIC),
                24 => attr.attr.remove(Attr::UNDERLINE),
                25 => attr.attr.remove(Attr::BLINK),
                27 => attr.attr.remove(Attr::REVERSE),
                28 => attr.attr.remove(Attr::INVISIBLE),
                29 => attr.attr.remove(Attr::STRUCK),
                38 => {
                    if let Some(color) = extended_color(args, &mut i) {
                        attr.fg = color;
                    }
                }
                39 => attr.fg = self.default_attr.fg,
                48 => {
                    if let Some(color) = extended_color(args, &mut i) {
                        attr.bg = color;
                    }
                }
                49 => attr.bg = self.default_attr.bg,
                v @ 30..=37 => attr.fg = Color::Indexed((v - 30) as u8),
                v @ 40..=47 => attr.bg = Color::Indexed((v - 40) as u8),
                v @ 90..=97 => attr.fg = Color::Indexed((v - 90 + 8) as u8),
                v @ 100..=107 => attr.bg = Color::Indexed((v - 100 + 8) as u8),
                v => tracing::debug!("erresc(default): gfx attr {} unknown", v),
            }
            i += 1;
        }
    }

    /// OSC, DCS, APC, PM and the old title sequence
    fn execute_str(&mut self, seq: &StrSequence) {
        let par = seq.arg(0).map_or(0, atoi);

        match seq.kind {
            b']' => match par {
                0 => {
                    if let Some(title) = seq.arg(1) {
                        self.handler.handle(Event::Title(Some(title.to_string())));
                        self.handler.handle(Event::IconTitle(title.to_string()));
                    }
                    return;
                }
                1 => {
                    if let Some(title) = seq.arg(1) {
                        self.handler.handle(Event::IconTitle(title.to_string()));
                    }
                    return;
                }
                2 => {
                    if let Some(title) = seq.arg(1) {
                        self.handler.handle(Event::Title(Some(title.to_string())));
                    }
                    return;
                }
                52 => {
                    if let Some(data) = seq.arg(2) {
                        match base64::decode(data.as_bytes()) {
                            Ok(bytes) => {
                                self.handler.handle(Event::Copy(bytes));
                            }
                            Err(e) => tracing::debug!("erresc: {}", e),
                        }
                    }
                    return;
                }
                4 | 104 => {
                    let name = if par == 4 {
                        match seq.arg(2) {
                            Some(name) => Some(name.to_string()),
                            None => return self.str_unknown(),
                        }
                    } else {
                        None
                    };
                    let index = seq.arg(1).map(atoi);
                    let event = Event::ColorName {
                        index,
                        name: name.clone(),
                    };
                    if self.handler.handle(event) == EventResult::Unsupported {
                        if par == 104 && index.is_none() {
                            return;
                        }
                        tracing::debug!(
                            "erresc: invalid color j={}, p={}",
                            index.unwrap_or(-1),
                            name.as_deref().unwrap_or("(null)")
                        );
                    }
                    return;
                }
                _ => {}
            },
            b'k' => {
                let title = seq.arg(0).unwrap_or_default().to_string();
                self.handler.handle(Event::Title(Some(title)));
                return;
            }
            b'P' | b'_' | b'^' => return,
            _ => {}
        }
        self.str_unknown();
    }

    fn str_unknown(&mut self) {
        let dump = self.parser.str_dump();
        tracing::debug!("erresc: unknown str {}", dump);
        self.handler.handle(Event::StrError(dump));
    }

    fn send_identification(&mut self) {
        let id = self.vtiden.clone();
        self.send(&id, false);
    }

    /// Queue bytes for the child.
    ///
    /// With `may_echo` and local echo enabled the bytes are also shown on
    /// screen (controls in caret notation). In CRLF mode every CR is
    /// followed by LF.
    pub fn send(&mut self, data: &[u8], may_echo: bool) {
        if may_echo && self.mode.contains(TermMode::ECHO) {
            self.write_bytes(data, true);
        }
        if !self.mode.contains(TermMode::CRLF) {
            self.output.extend_from_slice(data);
            return;
        }
        for &b in data {
            self.output.push(b);
            if b == b'\r' {
                self.output.push(b'\n');
            }
        }
    }

    /// Remove and return the bytes queued for the child
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    pub fn has_output(&self) -> bool {
        !self.output.is_empty()
    }

    /// Report that the child side closed
    pub fn notify_eof(&mut self) {
        self.handler.handle(Event::Eof);
    }

    /// Ask the application to restore its default title
    pub fn reset_title(&mut self) {
        self.handler.handle(Event::Title(None));
    }

    /// Row at a viewport-relative offset; negative offsets reach into the
    /// history of the active screen
    pub fn line(&self, offset: isize) -> Option<&[Glyph]> {
        self.screen
            .line_at(offset)
            .map(|line| &line.cells()[..self.cols])
    }

    /// Cell at (`x`, `y`) of the visible screen
    pub fn cell(&self, x: usize, y: usize) -> Option<&Glyph> {
        if y >= self.rows {
            return None;
        }
        self.screen.line(y).cells()[..self.cols].get(x)
    }

    /// The ring holding the primary screen, whichever screen is shown
    fn primary(&self) -> &Ring {
        match &self.alt {
            Some(alt) if self.mode.contains(TermMode::ALTSCREEN) => alt,
            _ => &self.screen,
        }
    }

    /// Lines of primary-screen history
    pub fn history_len(&self) -> usize {
        self.primary().history()
    }

    /// History row `n`, where 1 is the most recent
    pub fn history_line(&self, n: usize) -> Option<&[Glyph]> {
        let offset = isize::try_from(n).ok()?;
        if offset == 0 {
            return None;
        }
        self.primary()
            .line_at(-offset)
            .map(|line| &line.cells()[..self.cols])
    }

    /// History plus visible rows of the primary screen
    pub fn seen(&self) -> usize {
        self.primary().seen()
    }

    /// Primary history followed by the visible screen, one line per row
    pub fn contents(&self) -> String {
        let ring = self.primary();
        let first = -(ring.history() as isize);
        (first..self.rows as isize)
            .filter_map(|offset| ring.line_at(offset))
            .map(|line| line.text(self.cols))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_dirty(&self, row: usize) -> bool {
        self.dirty.get(row).copied().unwrap_or(false)
    }

    pub fn clear_dirty(&mut self, row: usize) {
        if let Some(dirty) = self.dirty.get_mut(row) {
            *dirty = false;
        }
    }

    /// Mark every row dirty
    pub fn full_dirty(&mut self) {
        self.dirty.fill(true);
    }

    /// Mark rows `top..=bot` dirty (clamped)
    pub fn set_dirty(&mut self, top: usize, bot: usize) {
        let bot = bot.min(self.rows - 1);
        if top > bot {
            return;
        }
        self.dirty[top..=bot].fill(true);
    }

    /// Whether any visible cell carries one of `attr`
    pub fn attr_set(&self, attr: Attr) -> bool {
        (0..self.rows).any(|y| self.screen.line(y).has_attr(self.cols, attr))
    }

    /// Mark dirty every row with a cell carrying one of `attr`
    pub fn set_dirty_attr(&mut self, attr: Attr) {
        for y in 0..self.rows {
            if self.screen.line(y).has_attr(self.cols, attr) {
                self.dirty[y] = true;
            }
        }
    }

    /// Significant length of row `y`
    pub fn line_len(&self, y: usize) -> usize {
        if y >= self.rows {
            return 0;
        }
        self.screen.line(y).len(self.cols)
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn cursor_position(&self) -> (usize, usize) {
        (self.cursor.x, self.cursor.y)
    }

    pub fn cursor_visible(&self) -> bool {
        !self.win_mode.contains(WinMode::HIDE)
    }

    pub fn mode(&self) -> TermMode {
        self.mode
    }

    /// Application modes as last announced
    pub fn win_mode(&self) -> WinMode {
        self.win_mode
    }

    pub fn scroll_region(&self) -> (usize, usize) {
        (self.top, self.bot)
    }

    pub fn is_alt_screen(&self) -> bool {
        self.mode.contains(TermMode::ALTSCREEN)
    }

    /// Resize the screens. Zero sizes are rejected.
    pub fn resize(&mut self, cols: usize, rows: usize) {
        if cols < 1 || rows < 1 {
            tracing::warn!("tresize: error resizing to {}x{}", cols, rows);
            return;
        }

        let old_cols = self.cols;
        let old_maxcol = self.maxcol;
        let mincol = cols.min(old_cols);
        let maxcol = cols.max(old_maxcol);
        let template = self.cursor.attr;

        let cursor_y = self.cursor.y;
        self.screen.resize(rows, cursor_y, &template);
        self.screen.ensure_width(maxcol, &template);
        if let Some(alt) = self.alt.as_mut() {
            alt.resize(rows, cursor_y, &template);
            alt.ensure_width(maxcol, &template);
        }

        self.dirty.resize(rows, true);
        self.tabs.resize(maxcol, false);
        if cols > old_cols {
            self.tabs[old_cols..cols].fill(false);
            let last = (1..old_cols).rev().find(|&x| self.tabs[x]).unwrap_or(0);
            if self.tab_width > 0 {
                let mut x = last + self.tab_width;
                while x < cols {
                    self.tabs[x] = true;
                    x += self.tab_width;
                }
            }
        }

        self.cols = cols;
        self.rows = rows;
        self.maxcol = maxcol;
        self.set_scroll(0, rows as i64 - 1);
        let (x, y) = (self.cursor.x as i64, self.cursor.y as i64);
        self.move_to(x, y);
        for saved in &mut self.saved {
            saved.x = saved.x.min(cols - 1);
            saved.y = saved.y.min(rows - 1);
        }

        if cols > old_maxcol {
            let (x1, x2) = (mincol as i64, maxcol as i64 - 1);
            for _ in 0..2 {
                self.clear_region(x1, 0, x2, rows as i64 - 1);
                if self.alt.is_none() {
                    break;
                }
                self.swap_screen();
            }
        }
        self.full_dirty();
    }

    /// Set or remove the printer sink
    pub fn set_printer(&mut self, sink: Option<Box<dyn Write>>) {
        self.printer = sink;
    }

    /// Toggle copying of all output to the printer
    pub fn toggle_printer(&mut self) {
        self.mode.toggle(TermMode::PRINT);
    }

    /// Send the whole screen to the printer
    pub fn print_screen(&mut self) {
        for y in 0..self.rows {
            self.dump_line(y);
        }
    }

    /// Send row `y` to the printer
    pub fn dump_line(&mut self, y: usize) {
        if y >= self.rows || self.printer.is_none() {
            return;
        }
        let line = self.screen.line(y);
        let len = line.len(self.cols);
        let mut bytes = Vec::with_capacity(len + 1);
        let mut buf = [0u8; utf8::UTF_SIZ];
        for glyph in line.cells()[..len].iter().filter(|g| !g.is_dummy()) {
            bytes.extend_from_slice(utf8::encode_char(glyph.u, &mut buf));
        }
        bytes.push(b'\n');
        self.printer_write(&bytes);
    }

    fn printer_write(&mut self, bytes: &[u8]) {
        let Some(printer) = self.printer.as_mut() else {
            return;
        };
        if let Err(e) = printer.write_all(bytes) {
            tracing::warn!("error writing to output file: {}", e);
            self.printer = None;
        }
    }

    /// Serializable copy of the visible state
    pub fn snapshot(&self) -> Snapshot {
        let grid = (0..self.rows)
            .map(|y| {
                self.screen.line(y).cells()[..self.cols]
                    .iter()
                    .map(CellSnapshot::from)
                    .collect()
            })
            .collect();
        Snapshot {
            cols: self.cols,
            rows: self.rows,
            grid,
            cursor: CursorSnapshot {
                col: self.cursor.x,
                row: self.cursor.y,
                visible: self.cursor_visible(),
                wrap_next: self.cursor.wrap_next(),
            },
            scroll_top: self.top,
            scroll_bottom: self.bot,
            term_mode: self.mode,
            win_mode: self.win_mode,
            alternate_screen: self.is_alt_screen(),
            history: self.history_len(),
        }
    }

    /// Visible text, one line per row without trailing blanks
    pub fn screen_text(&self) -> String {
        (0..self.rows)
            .map(|y| self.screen.line(y).text(self.cols))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parse the `5;n` or `2;r;g;b` tail of SGR 38/48, advancing `i` past it
fn extended_color(args: &[i64], i: &mut usize) -> Option<Color> {
    let arg = |k: usize| args.get(k).copied().unwrap_or(0);

    match arg(*i + 1) {
        2 => {
            if *i + 4 >= args.len() {
                tracing::debug!("erresc(38): Incorrect number of parameters ({})", *i);
                return None;
            }
            let (r, g, b) = (arg(*i + 2), arg(*i + 3), arg(*i + 4));
            *i += 4;
            match (u8::try_from(r), u8::try_from(g), u8::try_from(b)) {
                (Ok(r), Ok(g), Ok(b)) => Some(Color::Rgb(r, g, b)),
                _ => {
                    tracing::debug!("erresc: bad rgb color ({},{},{})", r, g, b);
                    None
                }
            }
        }
        5 => {
            if *i + 2 >= args.len() {
                tracing::debug!("erresc(38): Incorrect number of parameters ({})", *i);
                return None;
            }
            *i += 2;
            match u8::try_from(arg(*i)) {
                Ok(index) => Some(Color::Indexed(index)),
                Err(_) => {
                    tracing::debug!("erresc: bad fgcolor {}", arg(*i));
                    None
                }
            }
        }
        other => {
            tracing::debug!("erresc(38): gfx attr {} unknown", other);
            None
        }
    }
}
