//! Run a command on a PTY and print the screen it leaves behind
//!
//! Standard input is forwarded to the child, so the runner can also drive
//! simple interactive programs from a pipe.

use std::io::{self, Read};
use std::os::unix::io::AsRawFd;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use nix::poll::{poll, PollFd, PollFlags};
use st_term::app::logging;
use st_term::pty::ChildExit;
use st_term::{Config, Event, EventResult, ReadStatus, Session};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let mut config = Config::load_or_default();
    let mut timeout = Duration::from_secs(10);
    let mut forward_stdin = true;
    let mut show_help = false;
    let mut command: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--cols" => {
                i += 1;
                if let Some(cols) = args.get(i).and_then(|s| s.parse().ok()) {
                    config.terminal.cols = cols;
                }
            },
            "-r" | "--rows" => {
                i += 1;
                if let Some(rows) = args.get(i).and_then(|s| s.parse().ok()) {
                    config.terminal.rows = rows;
                }
            },
            "-t" | "--timeout" => {
                i += 1;
                let secs = args.get(i).and_then(|s| s.parse::<f64>().ok());
                if let Some(secs) = secs.filter(|s| s.is_finite() && *s >= 0.0) {
                    timeout = Duration::from_secs_f64(secs);
                }
            },
            "-n" | "--no-stdin" => forward_stdin = false,
            "-h" | "--help" => show_help = true,
            "--" => {
                command.extend(args[i + 1..].iter().cloned());
                break;
            },
            _ => {
                command.extend(args[i..].iter().cloned());
                break;
            },
        }
        i += 1;
    }

    if show_help {
        print_help();
        return ExitCode::SUCCESS;
    }

    logging::init(config.log_level.as_deref().or(Some("info")));

    if let Some((program, rest)) = command.split_first() {
        config.shell.command = Some(program.clone());
        config.shell.args = rest.to_vec();
    }

    let handler = |event: Event| {
        match &event {
            Event::Title(Some(title)) => tracing::info!("title: {}", title),
            Event::Bell => tracing::info!("bell"),
            Event::Eof => tracing::info!("child closed the terminal"),
            Event::ColorName { .. } => return EventResult::Unsupported,
            other => tracing::debug!("event: {:?}", other),
        }
        EventResult::Handled
    };

    let mut session = match Session::spawn(&config, handler) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Failed to spawn PTY: {}", e);
            return ExitCode::FAILURE;
        },
    };
    tracing::info!("PTY spawned, child PID: {}", session.pty().child_pid());

    let deadline = Instant::now() + timeout;
    let stdin = io::stdin();
    let stdin_fd = stdin.as_raw_fd();
    let mut stdin_open = forward_stdin;
    let mut input = [0u8; 1024];

    loop {
        if Instant::now() >= deadline {
            tracing::warn!("timed out after {:?}", timeout);
            break;
        }

        let master = session.master_fd();
        // SAFETY: both descriptors stay open for the duration of the poll
        let master_fd = unsafe { std::os::fd::BorrowedFd::borrow_raw(master) };
        let stdin_borrowed = unsafe { std::os::fd::BorrowedFd::borrow_raw(stdin_fd) };
        let mut fds = vec![PollFd::new(&master_fd, PollFlags::POLLIN)];
        if stdin_open {
            fds.push(PollFd::new(&stdin_borrowed, PollFlags::POLLIN));
        }
        match poll(&mut fds, 100) {
            Ok(_) => {},
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => {
                tracing::error!("poll error: {}", e);
                break;
            },
        }

        let master_ready = is_ready(&fds[0]);
        let stdin_ready = stdin_open && is_ready(&fds[1]);
        drop(fds);

        if stdin_ready {
            match stdin.lock().read(&mut input) {
                Ok(0) | Err(_) => stdin_open = false,
                Ok(n) => {
                    if let Err(e) = session.send(&input[..n], true) {
                        tracing::error!("write error: {}", e);
                        break;
                    }
                },
            }
        }

        if master_ready {
            match session.read() {
                Ok(ReadStatus::Eof) => break,
                Ok(_) => {},
                Err(e) => {
                    tracing::error!("read error: {}", e);
                    break;
                },
            }
        }
    }

    println!("{}", session.terminal().screen_text());

    if session.is_alive() {
        let _ = session.hangup();
    }
    match session.wait() {
        Ok(Some(ChildExit::Exited(code))) => ExitCode::from(code as u8),
        Ok(Some(ChildExit::Signaled(_))) => ExitCode::FAILURE,
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("wait error: {}", e);
            ExitCode::FAILURE
        },
    }
}

fn is_ready(fd: &PollFd<'_>) -> bool {
    fd.revents()
        .is_some_and(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP))
}

fn print_help() {
    println!("st-run: run a command on a PTY and print the final screen");
    println!();
    println!("Usage: st-run [OPTIONS] [--] [COMMAND [ARGS...]]");
    println!();
    println!("Options:");
    println!("  -c, --cols <N>       Terminal width (default: 80)");
    println!("  -r, --rows <N>       Terminal height (default: 24)");
    println!("  -t, --timeout <SECS> Give up after this long (default: 10)");
    println!("  -n, --no-stdin       Don't forward standard input");
    println!("  -h, --help           Show this help message");
    println!();
    println!("Without a command the shell from $SHELL or the password");
    println!("database is started.");
}
