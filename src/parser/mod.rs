//! Terminal escape sequence parser
//!
//! A stateful, code-point-at-a-time parser that turns terminal output into
//! [`Action`]s, plus the UTF-8 and base64 codecs it relies on.

mod actions;
pub mod base64;
mod state;
pub mod utf8;

pub use actions::{
    escape_for_log, Action, CsiSequence, EscAction, StrSequence, ESC_ARG_SIZ, ESC_BUF_SIZ,
    STR_ARG_SIZ, STR_BUF_SIZ,
};
pub use state::{is_control, Parser, STR_BUF_LIMIT};
