//! PTY session
//!
//! A [`Session`] owns one [`Terminal`] and the [`Pty`] its child runs on.
//! The embedding application polls [`Session::master_fd`] in its own event
//! loop and calls [`Session::read`] when it is readable; keyboard input and
//! terminal replies go back through [`Session::send`] / [`Session::flush`].

use std::os::unix::io::RawFd;

use crate::app::{Config, ShellConfig};
use crate::event::EventHandler;
use crate::pty::{login_shell, ChildExit, Pty, PtyResult, SpawnOptions, WindowSize};
use crate::terminal::Terminal;

/// Size of the read buffer
pub const BUFSIZ: usize = 8192;

/// Largest single write to the child
const WRITE_CHUNK: usize = 256;

/// Outcome of [`Session::read`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// This many bytes were read and processed
    Data(usize),
    /// Nothing to read right now
    WouldBlock,
    /// The child side closed
    Eof,
}

/// A terminal attached to a child process
#[derive(Debug)]
pub struct Session<H: EventHandler> {
    terminal: Terminal<H>,
    pty: Pty,
    buf: Vec<u8>,
    /// Undecoded bytes kept at the start of `buf` from the previous read
    buflen: usize,
    eof: bool,
}

impl<H: EventHandler> Session<H> {
    /// Start the configured shell on a new PTY
    pub fn spawn(config: &Config, handler: H) -> PtyResult<Self> {
        let terminal = Terminal::new(&config.terminal, handler);
        let program = resolve_shell(&config.shell);
        let args: Vec<&str> = config.shell.args.iter().map(String::as_str).collect();
        let options = SpawnOptions {
            term_name: config.shell.term_name.clone(),
            working_dir: config.shell.working_dir.clone(),
            size: WindowSize::from_cells(terminal.cols(), terminal.rows()),
        };

        tracing::info!("spawning {} {:?}", program, args);
        let pty = Pty::spawn_with(&program, &args, &options)?;
        Ok(Self::from_parts(terminal, pty))
    }

    /// Attach an existing terminal to an already spawned PTY
    pub fn from_parts(terminal: Terminal<H>, pty: Pty) -> Self {
        Self {
            terminal,
            pty,
            buf: vec![0; BUFSIZ],
            buflen: 0,
            eof: false,
        }
    }

    pub fn terminal(&self) -> &Terminal<H> {
        &self.terminal
    }

    pub fn terminal_mut(&mut self) -> &mut Terminal<H> {
        &mut self.terminal
    }

    pub fn pty(&self) -> &Pty {
        &self.pty
    }

    /// Descriptor to poll for readability
    pub fn master_fd(&self) -> RawFd {
        self.pty.master_fd()
    }

    /// Wait up to `timeout_ms` for output from the child
    pub fn wait_readable(&self, timeout_ms: i32) -> PtyResult<bool> {
        self.pty.poll_read(timeout_ms)
    }

    /// Read what the child wrote, process it and send any replies.
    ///
    /// A UTF-8 sequence split across reads is kept and completed by the
    /// next read.
    pub fn read(&mut self) -> PtyResult<ReadStatus> {
        let status = self.fill()?;
        self.flush()?;
        Ok(status)
    }

    fn fill(&mut self) -> PtyResult<ReadStatus> {
        let n = match self.pty.read(&mut self.buf[self.buflen..])? {
            None => return Ok(ReadStatus::WouldBlock),
            Some(0) => {
                if !std::mem::replace(&mut self.eof, true) {
                    self.terminal.notify_eof();
                }
                return Ok(ReadStatus::Eof);
            }
            Some(n) => n,
        };

        self.buflen += n;
        let written = self.terminal.process(&self.buf[..self.buflen]);
        self.buflen -= written;
        if self.buflen > 0 {
            self.buf.copy_within(written..written + self.buflen, 0);
        }
        Ok(ReadStatus::Data(n))
    }

    /// Send user input to the child (see [`Terminal::send`] for echo and
    /// CRLF handling)
    pub fn send(&mut self, data: &[u8], may_echo: bool) -> PtyResult<()> {
        self.terminal.send(data, may_echo);
        self.flush()
    }

    /// Write everything the terminal has queued for the child. Once the
    /// child side closed, queued bytes are discarded.
    pub fn flush(&mut self) -> PtyResult<()> {
        while self.terminal.has_output() {
            let pending = self.terminal.take_output();
            if self.eof {
                tracing::debug!("dropping {} bytes for a closed child", pending.len());
                continue;
            }
            self.write_all(&pending)?;
        }
        Ok(())
    }

    /// Write in small chunks, draining the child's output whenever it stops
    /// accepting input so neither side blocks on the other
    fn write_all(&mut self, mut data: &[u8]) -> PtyResult<()> {
        while !data.is_empty() {
            let ready = self.pty.poll(true, -1)?;
            if ready.writable {
                let chunk = data.len().min(WRITE_CHUNK);
                let n = self.pty.write(&data[..chunk])?;
                data = &data[n..];
                if n == chunk {
                    continue;
                }
                if self.fill()? == ReadStatus::Eof {
                    break;
                }
                continue;
            }
            if ready.readable && self.fill()? == ReadStatus::Eof {
                break;
            }
        }
        if !data.is_empty() {
            tracing::debug!("dropping {} bytes for a closed child", data.len());
        }
        Ok(())
    }

    /// Resize the terminal and the PTY. A failing ioctl is logged only.
    pub fn resize(&mut self, cols: usize, rows: usize) {
        self.resize_with_pixels(cols, rows, 0, 0);
    }

    /// Resize, also reporting the window's pixel size to the child
    pub fn resize_with_pixels(&mut self, cols: usize, rows: usize, width: u16, height: u16) {
        self.terminal.resize(cols, rows);
        let cells = WindowSize::from_cells(self.terminal.cols(), self.terminal.rows());
        let size = WindowSize::with_pixels(cells.cols, cells.rows, width, height);
        if let Err(e) = self.pty.resize(size) {
            tracing::warn!("couldn't set window size: {}", e);
        }
    }

    /// Send SIGHUP to the child
    pub fn hangup(&self) -> PtyResult<()> {
        self.pty.hangup()
    }

    pub fn send_break(&self) -> PtyResult<()> {
        self.pty.send_break()
    }

    /// Reap the child if it exited
    pub fn try_wait(&mut self) -> PtyResult<Option<ChildExit>> {
        self.pty.try_wait()
    }

    /// Block until the child exits; `None` if it was already reaped
    pub fn wait(&mut self) -> PtyResult<Option<ChildExit>> {
        self.pty.wait()
    }

    pub fn is_alive(&mut self) -> bool {
        self.pty.is_alive()
    }
}

/// The program to run: explicit command, then `$SHELL`, then the password
/// database, then the configured default
pub fn resolve_shell(config: &ShellConfig) -> String {
    pick_shell(
        config.command.as_deref(),
        std::env::var("SHELL").ok(),
        login_shell,
        &config.default_shell,
    )
}

fn pick_shell(
    command: Option<&str>,
    env_shell: Option<String>,
    passwd_shell: impl FnOnce() -> Option<String>,
    default: &str,
) -> String {
    let non_empty = |s: &String| !s.is_empty();
    command
        .map(str::to_string)
        .filter(non_empty)
        .or_else(|| env_shell.filter(non_empty))
        .or_else(|| passwd_shell().filter(non_empty))
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_shell_order() {
        let pw = || Some("/bin/zsh".to_string());
        assert_eq!(
            pick_shell(Some("/bin/fish"), Some("/bin/bash".into()), pw, "/bin/sh"),
            "/bin/fish"
        );
        assert_eq!(pick_shell(None, Some("/bin/bash".into()), pw, "/bin/sh"), "/bin/bash");
        assert_eq!(pick_shell(None, None, pw, "/bin/sh"), "/bin/zsh");
        assert_eq!(pick_shell(None, Some(String::new()), || None, "/bin/sh"), "/bin/sh");
    }

    #[test]
    fn test_explicit_command_wins() {
        let config = ShellConfig {
            command: Some("/usr/bin/env".into()),
            ..ShellConfig::default()
        };
        assert_eq!(resolve_shell(&config), "/usr/bin/env");
    }
}
