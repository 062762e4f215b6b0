//! Unix PTY implementation
//!
//! Implements PTY creation and child process management using POSIX APIs.

use std::ffi::CString;
use std::io::Write as _;
use std::os::fd::BorrowedFd;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{fcntl, open, FcntlArg, OFlag};
use nix::libc::{self, STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use nix::poll::{poll, PollFd, PollFlags};
use nix::pty::{grantpt, posix_openpt, ptsname, unlockpt, PtyMaster};
use nix::sys::signal::{kill, signal, SigHandler, Signal};
use nix::sys::stat::Mode;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{chdir, close, dup2, execvp, fork, getuid, read, setsid, write, ForkResult, Pid, User};

use super::{PtyError, PtyResult, WindowSize};
use crate::app::DEFAULT_TERM_NAME;

/// Signals reset to their default disposition in the child
const CHILD_SIGNALS: [Signal; 6] = [
    Signal::SIGCHLD,
    Signal::SIGHUP,
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTERM,
    Signal::SIGALRM,
];

/// How the child is started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnOptions {
    /// `TERM` in the child environment
    pub term_name: String,
    /// Working directory of the child
    pub working_dir: Option<PathBuf>,
    pub size: WindowSize,
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self {
            term_name: DEFAULT_TERM_NAME.to_string(),
            working_dir: None,
            size: WindowSize::default(),
        }
    }
}

/// Result of a readiness poll on the master
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    /// Data (or EOF) can be read
    pub readable: bool,
    /// A write would make progress
    pub writable: bool,
}

/// How the child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    Exited(i32),
    Signaled(i32),
}

/// Shell from the password database entry of the current user
pub fn login_shell() -> Option<String> {
    let user = User::from_uid(getuid()).ok()??;
    let shell = user.shell.to_string_lossy().into_owned();
    (!shell.is_empty()).then_some(shell)
}

/// A pseudoterminal with a spawned child process
pub struct Pty {
    /// The PTY master file descriptor
    master: PtyMaster,
    /// The child process ID
    child_pid: Pid,
    /// Whether the child is still running
    child_alive: bool,
}

impl std::fmt::Debug for Pty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pty")
            .field("master", &self.master.as_raw_fd())
            .field("child_pid", &self.child_pid)
            .field("child_alive", &self.child_alive)
            .finish()
    }
}

impl Pty {
    /// Spawn `program` with `args` on a new PTY of the given size
    pub fn spawn(program: &str, args: &[&str], size: WindowSize) -> PtyResult<Self> {
        let options = SpawnOptions {
            size,
            ..SpawnOptions::default()
        };
        Self::spawn_with(program, args, &options)
    }

    /// Spawn `program` with `args` on a new PTY.
    ///
    /// The child becomes a session leader with the slave as controlling
    /// terminal and stdio. Its environment drops `COLUMNS`, `LINES` and
    /// `TERMCAP` and gets `LOGNAME`, `USER`, `SHELL`, `HOME` and `TERM`.
    pub fn spawn_with(program: &str, args: &[&str], options: &SpawnOptions) -> PtyResult<Self> {
        // Everything the child needs is prepared before forking
        let cstring = |s: &str| CString::new(s).map_err(|_| PtyError::Nul(s.to_string()));
        let program_c = cstring(program)?;
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(program_c.clone());
        for arg in args {
            argv.push(cstring(arg)?);
        }
        let env = child_env(program, &options.term_name)?;

        let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).map_err(PtyError::OpenMaster)?;
        grantpt(&master).map_err(PtyError::GrantPty)?;
        unlockpt(&master).map_err(PtyError::UnlockPty)?;

        // SAFETY: ptsname is not thread-safe, but we're calling it immediately
        // after unlockpt and before any other thread could interfere
        let slave_name = unsafe { ptsname(&master) }.map_err(PtyError::PtsName)?;

        set_window_size(master.as_raw_fd(), options.size)?;

        // SAFETY: the child only sets up its stdio and environment before exec
        match unsafe { fork() }.map_err(PtyError::Fork)? {
            ForkResult::Child => {
                drop(master);
                let err = exec_child(
                    &slave_name,
                    &program_c,
                    &argv,
                    &env,
                    options.working_dir.as_deref(),
                );
                let _ = writeln!(std::io::stderr(), "execvp {} failed: {}", program, err);
                // SAFETY: leave without running the parent's destructors or atexit handlers
                unsafe { libc::_exit(1) }
            }
            ForkResult::Parent { child } => {
                let flags = fcntl(master.as_raw_fd(), FcntlArg::F_GETFL)
                    .map_err(PtyError::SetNonBlocking)?;
                let flags = OFlag::from_bits_truncate(flags);
                fcntl(
                    master.as_raw_fd(),
                    FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK),
                )
                .map_err(PtyError::SetNonBlocking)?;

                tracing::debug!("spawned {} as pid {} on {}", program, child, slave_name);
                Ok(Pty {
                    master,
                    child_pid: child,
                    child_alive: true,
                })
            }
        }
    }

    /// Get the raw file descriptor of the PTY master
    pub fn master_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }

    /// Get the child process ID
    pub fn child_pid(&self) -> Pid {
        self.child_pid
    }

    /// Check if the child process is still running
    pub fn is_alive(&mut self) -> bool {
        let _ = self.try_wait();
        self.child_alive
    }

    /// Reap the child if it has exited, without blocking
    pub fn try_wait(&mut self) -> PtyResult<Option<ChildExit>> {
        if !self.child_alive {
            return Ok(None);
        }
        let status = waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG)).map_err(|e| {
            self.child_alive = false;
            PtyError::Wait(e)
        })?;
        Ok(self.record(status))
    }

    /// Wait for the child process to exit
    pub fn wait(&mut self) -> PtyResult<Option<ChildExit>> {
        while self.child_alive {
            let status = waitpid(self.child_pid, None).map_err(PtyError::Wait)?;
            if let Some(exit) = self.record(status) {
                return Ok(Some(exit));
            }
        }
        Ok(None)
    }

    fn record(&mut self, status: WaitStatus) -> Option<ChildExit> {
        let exit = match status {
            WaitStatus::Exited(_, code) => ChildExit::Exited(code),
            WaitStatus::Signaled(_, signal, _) => ChildExit::Signaled(signal as i32),
            _ => return None,
        };
        self.child_alive = false;
        match exit {
            ChildExit::Exited(0) => {}
            ChildExit::Exited(code) => {
                tracing::warn!("child exited with status {}", code)
            }
            ChildExit::Signaled(sig) => {
                tracing::warn!("child terminated due to signal {}", sig)
            }
        }
        Some(exit)
    }

    /// Read from the PTY master (non-blocking).
    ///
    /// Returns `Ok(None)` when no data is available and `Ok(Some(0))` once
    /// the slave side is closed.
    pub fn read(&self, buf: &mut [u8]) -> PtyResult<Option<usize>> {
        match read(self.master.as_raw_fd(), buf) {
            Ok(n) => Ok(Some(n)),
            // EAGAIN and EWOULDBLOCK are the same value on Linux
            Err(Errno::EAGAIN) | Err(Errno::EINTR) => Ok(None),
            // Linux reports a closed slave as EIO
            Err(Errno::EIO) => Ok(Some(0)),
            Err(e) => Err(PtyError::Read(e)),
        }
    }

    /// Write to the PTY master.
    ///
    /// Returns the number of bytes written, 0 if the write would block.
    pub fn write(&self, data: &[u8]) -> PtyResult<usize> {
        match write(self.master.as_raw_fd(), data) {
            Ok(n) => Ok(n),
            Err(Errno::EAGAIN) | Err(Errno::EINTR) => Ok(0),
            Err(e) => Err(PtyError::Write(e)),
        }
    }

    /// Wait up to `timeout_ms` for the master to become readable, or
    /// writable when `want_write` is set. A negative timeout blocks.
    pub fn poll(&self, want_write: bool, timeout_ms: i32) -> PtyResult<Readiness> {
        let mut events = PollFlags::POLLIN;
        if want_write {
            events |= PollFlags::POLLOUT;
        }
        // SAFETY: The master fd is valid for the lifetime of this Pty
        let borrowed_fd = unsafe { BorrowedFd::borrow_raw(self.master.as_raw_fd()) };
        let mut fds = [PollFd::new(&borrowed_fd, events)];
        match poll(&mut fds, timeout_ms) {
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(Readiness::default()),
            Err(e) => return Err(PtyError::Poll(e)),
        }
        let revents = fds[0].revents().unwrap_or(PollFlags::empty());
        Ok(Readiness {
            readable: revents
                .intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR),
            writable: revents.contains(PollFlags::POLLOUT),
        })
    }

    /// Poll for data available to read
    pub fn poll_read(&self, timeout_ms: i32) -> PtyResult<bool> {
        Ok(self.poll(false, timeout_ms)?.readable)
    }

    /// Resize the PTY
    pub fn resize(&self, size: WindowSize) -> PtyResult<()> {
        set_window_size(self.master.as_raw_fd(), size)
    }

    /// Current window size of the PTY
    pub fn window_size(&self) -> PtyResult<WindowSize> {
        get_window_size(self.master.as_raw_fd())
    }

    /// Send a signal to the child process
    pub fn signal(&self, signal: Signal) -> PtyResult<()> {
        kill(self.child_pid, signal).map_err(PtyError::Signal)
    }

    /// Send SIGHUP to the child
    pub fn hangup(&self) -> PtyResult<()> {
        self.signal(Signal::SIGHUP)
    }

    /// Transmit a break on the line
    pub fn send_break(&self) -> PtyResult<()> {
        // SAFETY: the master fd is valid for the lifetime of this Pty
        if unsafe { libc::tcsendbreak(self.master.as_raw_fd(), 0) } < 0 {
            return Err(PtyError::Break(Errno::last()));
        }
        Ok(())
    }
}

impl Drop for Pty {
    fn drop(&mut self) {
        if self.child_alive {
            let _ = self.hangup();
            let _ = waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG));
        }
    }
}

/// Environment changes applied in the child
fn child_env(program: &str, term_name: &str) -> PtyResult<Vec<(String, String)>> {
    let mut env = Vec::new();
    match User::from_uid(getuid()).map_err(PtyError::Passwd)? {
        Some(user) => {
            env.push(("LOGNAME".to_string(), user.name.clone()));
            env.push(("USER".to_string(), user.name));
            env.push(("HOME".to_string(), user.dir.to_string_lossy().into_owned()));
        }
        None => tracing::warn!("no password database entry for uid {}", getuid()),
    }
    env.push(("SHELL".to_string(), program.to_string()));
    env.push(("TERM".to_string(), term_name.to_string()));
    Ok(env)
}

/// Runs in the forked child; returns only if something failed
fn exec_child(
    slave_name: &str,
    program: &CString,
    argv: &[CString],
    env: &[(String, String)],
    working_dir: Option<&Path>,
) -> nix::Error {
    if let Err(e) = setsid() {
        return e;
    }

    // Opening the slave after setsid makes it the controlling terminal
    let slave_fd = match open(slave_name, OFlag::O_RDWR, Mode::empty()) {
        Ok(fd) => fd,
        Err(e) => return e,
    };
    // SAFETY: TIOCSCTTY is a valid ioctl for setting controlling terminal
    if unsafe { libc::ioctl(slave_fd, libc::TIOCSCTTY as _, 0) } < 0 {
        return Errno::last();
    }

    for fd in [STDIN_FILENO, STDOUT_FILENO, STDERR_FILENO] {
        if let Err(e) = dup2(slave_fd, fd) {
            return e;
        }
    }
    if slave_fd > STDERR_FILENO {
        let _ = close(slave_fd);
    }

    for var in ["COLUMNS", "LINES", "TERMCAP"] {
        std::env::remove_var(var);
    }
    for (key, value) in env {
        std::env::set_var(key, value);
    }

    for sig in CHILD_SIGNALS {
        // SAFETY: restoring the default disposition installs no handler
        let _ = unsafe { signal(sig, SigHandler::SigDfl) };
    }

    if let Some(dir) = working_dir {
        if let Err(e) = chdir(dir) {
            return e;
        }
    }

    match execvp(program, argv) {
        Ok(never) => match never {},
        Err(e) => e,
    }
}

/// Set the window size on a PTY file descriptor
fn set_window_size(fd: RawFd, size: WindowSize) -> PtyResult<()> {
    let winsize = libc::winsize {
        ws_row: size.rows,
        ws_col: size.cols,
        ws_xpixel: size.pixel_width,
        ws_ypixel: size.pixel_height,
    };

    // SAFETY: TIOCSWINSZ is a valid ioctl for setting window size
    let result = unsafe { libc::ioctl(fd, libc::TIOCSWINSZ, &winsize) };

    if result < 0 {
        Err(PtyError::SetWinsize(Errno::last()))
    } else {
        Ok(())
    }
}

/// Get the window size from a PTY file descriptor
fn get_window_size(fd: RawFd) -> PtyResult<WindowSize> {
    let mut winsize = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };

    // SAFETY: TIOCGWINSZ is a valid ioctl for getting window size
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut winsize) };

    if result < 0 {
        Err(PtyError::GetWinsize(Errno::last()))
    } else {
        Ok(WindowSize::with_pixels(
            winsize.ws_col,
            winsize.ws_row,
            winsize.ws_xpixel,
            winsize.ws_ypixel,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    /// Read until `needle` shows up, EOF, or two seconds pass
    fn read_until(pty: &Pty, needle: &str) -> String {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut output = Vec::new();
        let mut buf = [0u8; 1024];
        while Instant::now() < deadline {
            if !pty.poll_read(50).expect("Failed to poll") {
                continue;
            }
            match pty.read(&mut buf).expect("Failed to read") {
                Some(0) => break,
                Some(n) => output.extend_from_slice(&buf[..n]),
                None => {}
            }
            if String::from_utf8_lossy(&output).contains(needle) {
                break;
            }
        }
        String::from_utf8_lossy(&output).into_owned()
    }

    #[test]
    fn test_pty_spawn() {
        let mut pty = Pty::spawn("/bin/echo", &["hello"], WindowSize::new(80, 24))
            .expect("Failed to spawn PTY");

        let output = read_until(&pty, "hello");
        assert!(output.contains("hello"), "Unexpected output: {}", output);

        assert_eq!(pty.wait().expect("Failed to wait"), Some(ChildExit::Exited(0)));
        assert!(!pty.is_alive());
    }

    #[test]
    fn test_pty_write_read() {
        let pty = Pty::spawn("/bin/cat", &[], WindowSize::new(80, 24)).expect("Failed to spawn PTY");

        let mut data: &[u8] = b"test\n";
        while !data.is_empty() {
            let n = pty.write(data).expect("Failed to write");
            data = &data[n..];
        }

        let output = read_until(&pty, "test");
        assert!(output.contains("test"), "Unexpected output: {}", output);
    }

    #[test]
    fn test_pty_resize() {
        let pty = Pty::spawn("/bin/sh", &[], WindowSize::new(80, 24)).expect("Failed to spawn PTY");
        assert_eq!(pty.window_size().expect("Failed to get size"), WindowSize::new(80, 24));

        pty.resize(WindowSize::with_pixels(120, 40, 960, 640))
            .expect("Failed to resize");

        let size = pty.window_size().expect("Failed to get size");
        assert_eq!(size.cols, 120);
        assert_eq!(size.rows, 40);
        assert_eq!(size.pixel_width, 960);
    }

    #[test]
    fn test_pty_environment() {
        let options = SpawnOptions {
            term_name: "st-test".to_string(),
            ..SpawnOptions::default()
        };
        let pty = Pty::spawn_with("/bin/sh", &["-c", "echo TERM=$TERM"], &options)
            .expect("Failed to spawn PTY");
        let output = read_until(&pty, "TERM=st-test");
        assert!(output.contains("TERM=st-test"), "Unexpected output: {}", output);
    }

    #[test]
    fn test_pty_working_dir() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let options = SpawnOptions {
            working_dir: Some(dir.path().to_path_buf()),
            ..SpawnOptions::default()
        };
        let pty = Pty::spawn_with("/bin/pwd", &[], &options).expect("Failed to spawn PTY");
        let name = dir
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let output = read_until(&pty, &name);
        assert!(output.contains(&name), "Unexpected output: {}", output);
    }

    #[test]
    fn test_pty_exec_failure_exits() {
        let mut pty = Pty::spawn("/nonexistent/program", &[], WindowSize::default())
            .expect("Failed to spawn PTY");
        assert_eq!(pty.wait().expect("Failed to wait"), Some(ChildExit::Exited(1)));
    }

    #[test]
    fn test_pty_hangup() {
        let mut pty = Pty::spawn("/bin/cat", &[], WindowSize::default()).expect("Failed to spawn PTY");
        pty.hangup().expect("Failed to signal");
        assert_eq!(
            pty.wait().expect("Failed to wait"),
            Some(ChildExit::Signaled(Signal::SIGHUP as i32))
        );
    }

    #[test]
    fn test_pty_rejects_nul() {
        let err = Pty::spawn("/bin/echo", &["a\0b"], WindowSize::default()).unwrap_err();
        assert!(matches!(err, PtyError::Nul(_)));
    }
}
