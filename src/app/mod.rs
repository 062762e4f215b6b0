//! Application glue module
//!
//! Configuration and logging setup shared by the binaries.

mod config;
pub mod logging;

pub use config::{
    Config, ConfigError, ShellConfig, TerminalConfig, DEFAULT_SHELL, DEFAULT_TERM_NAME,
    DEFAULT_VTIDEN,
};
