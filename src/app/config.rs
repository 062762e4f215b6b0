//! Configuration for the terminal engine and its session

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::Color;

/// Identification string sent for DA and DECID ("I am a VT102")
pub const DEFAULT_VTIDEN: &str = "\x1b[?6c";
/// Value of `TERM` in the child environment
pub const DEFAULT_TERM_NAME: &str = "st-256color";
/// Shell used when neither the command line, `$SHELL` nor the password
/// database name one
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Emulation engine settings
    pub terminal: TerminalConfig,
    /// Child process settings
    pub shell: ShellConfig,
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: Option<String>,
}

/// Settings consumed by [`crate::Terminal::new`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub cols: usize,
    pub rows: usize,
    /// Ring capacity in lines (visible rows included)
    pub scrollback: usize,
    /// Allocate an alternate screen
    pub alt_screen: bool,
    /// Spacing of the initial tab stops
    pub tab_width: usize,
    pub default_fg: Color,
    pub default_bg: Color,
    /// Reply to DA / DECID requests
    pub vtiden: String,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            cols: 80,
            rows: 24,
            scrollback: 1000,
            alt_screen: true,
            tab_width: 8,
            default_fg: Color::Indexed(7),
            default_bg: Color::Indexed(0),
            vtiden: DEFAULT_VTIDEN.to_string(),
        }
    }
}

impl TerminalConfig {
    /// Default settings with a given size
    pub fn with_size(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            ..Self::default()
        }
    }
}

/// Settings for the spawned child
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Explicit command; overrides `$SHELL` and the password database
    pub command: Option<String>,
    /// Arguments passed after the command
    pub args: Vec<String>,
    /// Fallback shell
    pub default_shell: String,
    /// `TERM` for the child
    pub term_name: String,
    /// Working directory for the child
    pub working_dir: Option<PathBuf>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            default_shell: DEFAULT_SHELL.to_string(),
            term_name: DEFAULT_TERM_NAME.to_string(),
            working_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// `config.json` in the configuration directory, if one can be found
    pub fn default_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.json"))
    }

    /// Load configuration from the default location or return the default
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("ignoring config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// `$XDG_CONFIG_HOME/st-term`, else `$HOME/.config/st-term`
fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .map(|dir| dir.join("st-term"))
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.terminal.cols, 80);
        assert_eq!(config.terminal.rows, 24);
        assert_eq!(config.terminal.tab_width, 8);
        assert_eq!(config.terminal.vtiden, "\x1b[?6c");
        assert_eq!(config.shell.term_name, "st-256color");
        assert_eq!(config.shell.default_shell, "/bin/sh");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn test_config_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"terminal": {"cols": 132}}"#).unwrap();
        assert_eq!(config.terminal.cols, 132);
        assert_eq!(config.terminal.rows, 24);
        assert_eq!(config.shell, ShellConfig::default());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.terminal.scrollback = 42;
        config.shell.command = Some("/bin/bash".into());
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Json(_))));
        assert!(matches!(
            Config::load(&dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
