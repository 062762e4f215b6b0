//! st-term: a terminal emulation engine
//!
//! Interprets the byte stream a child program writes to its terminal and
//! maintains the resulting screen state. The crate is split into:
//!
//! - `core`: glyphs, lines, the ring-buffered screen, cursor and modes
//! - `parser`: UTF-8 codec and the escape-sequence state machine
//! - `terminal`: the command dispatcher applying parsed sequences
//! - `event`: notifications to the embedding application
//! - `pty`: pseudoterminal allocation and child process management
//! - `session`: a terminal wired to a PTY
//! - `app`: configuration and logging setup
//!
//! Rendering, keyboard mapping and window management are left to the
//! embedding application, which reads [`Terminal::line`] and the dirty
//! flags after each [`Terminal::process`] call.

pub mod app;
pub mod core;
pub mod event;
pub mod parser;
#[cfg(unix)]
pub mod pty;
#[cfg(unix)]
pub mod session;
pub mod terminal;

pub use app::{Config, ShellConfig, TerminalConfig};
pub use event::{Event, EventHandler, EventLog, EventResult, NullHandler};
#[cfg(unix)]
pub use session::{ReadStatus, Session};
pub use terminal::Terminal;
