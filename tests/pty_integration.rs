//! Session tests against real child processes

#![cfg(unix)]

use std::time::{Duration, Instant};

use st_term::pty::ChildExit;
use st_term::{Config, Event, EventLog, ReadStatus, Session, ShellConfig, TerminalConfig};

fn config(cols: usize, rows: usize, command: &str, args: &[&str]) -> Config {
    Config {
        terminal: TerminalConfig::with_size(cols, rows),
        shell: ShellConfig {
            command: Some(command.to_string()),
            args: args.iter().map(|s| s.to_string()).collect(),
            ..ShellConfig::default()
        },
        ..Config::default()
    }
}

/// Read until the child closes its side or the deadline passes
fn drain(session: &mut Session<EventLog>) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if !session.wait_readable(100).expect("poll failed") {
            continue;
        }
        if session.read().expect("read failed") == ReadStatus::Eof {
            return true;
        }
    }
    false
}

fn wait_exit(session: &mut Session<EventLog>) -> Option<ChildExit> {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if let Some(exit) = session.try_wait().expect("wait failed") {
            return Some(exit);
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    None
}

#[test]
fn test_echo_reaches_screen() {
    let mut session = Session::spawn(&config(40, 5, "/bin/echo", &["hello pty"]), EventLog::new())
        .expect("Failed to spawn session");
    assert!(drain(&mut session));

    let text = session.terminal().screen_text();
    assert!(text.lines().next().unwrap_or("").starts_with("hello pty"), "{:?}", text);
    // echo's newline went through ONLCR
    assert_eq!(session.terminal().cursor_position(), (0, 1));

    let events = session.terminal_mut().handler_mut().take();
    assert_eq!(events.iter().filter(|e| **e == Event::Eof).count(), 1);
}

#[test]
fn test_eof_is_reported_once() {
    let mut session = Session::spawn(&config(20, 3, "/bin/true", &[]), EventLog::new())
        .expect("Failed to spawn session");
    assert!(drain(&mut session));
    assert_eq!(session.read().expect("read failed"), ReadStatus::Eof);

    let events = session.terminal_mut().handler_mut().take();
    assert_eq!(events, vec![Event::Eof]);
}

#[test]
fn test_input_after_eof_is_discarded() {
    let mut session = Session::spawn(&config(20, 3, "/bin/true", &[]), EventLog::new())
        .expect("Failed to spawn session");
    assert!(drain(&mut session));

    session.send(b"ignored\r", false).expect("send failed");
    assert!(!session.terminal().has_output());
    session.terminal_mut().process(b"\x1b[c");
    session.flush().expect("flush failed");
    assert!(!session.terminal().has_output());
}

#[test]
fn test_large_input_does_not_stall() {
    let mut session = Session::spawn(&config(80, 24, "/bin/cat", &[]), EventLog::new())
        .expect("Failed to spawn session");

    // Far more than the tty buffers hold; cat's echo has to be drained while sending
    let lines = 3000;
    let input: String = (0..lines).map(|i| format!("{:>45} end\n", i)).collect();
    assert_eq!(input.len(), lines * 50);
    session.send(input.as_bytes(), false).expect("send failed");
    session.send(b"\x04", false).expect("send failed");
    assert!(drain(&mut session));

    let text = session.terminal().screen_text();
    let last = format!("{:>45} end", lines - 1);
    assert!(text.contains(&last), "{:?}", text);
}

#[test]
fn test_identification_reply_reaches_child() {
    let script = "stty raw -echo; printf '\\033[c'; dd bs=1 count=5 2>/dev/null | od -c";
    let mut session = Session::spawn(&config(60, 5, "/bin/sh", &["-c", script]), EventLog::new())
        .expect("Failed to spawn session");
    assert!(drain(&mut session));

    let text = session.terminal().screen_text();
    assert!(text.contains("033   [   ?   6   c"), "{:?}", text);
}

#[test]
fn test_resize_reaches_child() {
    let mut session = Session::spawn(
        &config(80, 24, "/bin/sh", &["-c", "sleep 0.3; stty size"]),
        EventLog::new(),
    )
    .expect("Failed to spawn session");
    session.resize(100, 30);
    assert_eq!(session.terminal().cols(), 100);
    assert_eq!(session.terminal().rows(), 30);
    assert!(drain(&mut session));

    let text = session.terminal().screen_text();
    assert!(text.starts_with("30 100"), "{:?}", text);
}

#[test]
fn test_input_is_echoed_by_child() {
    let mut session = Session::spawn(
        &config(40, 5, "/bin/sh", &["-c", "read -r line; echo \"got:$line\""]),
        EventLog::new(),
    )
    .expect("Failed to spawn session");
    session.send(b"abc\n", true).expect("send failed");
    assert!(drain(&mut session));

    let text = session.terminal().screen_text();
    assert!(text.contains("got:abc"), "{:?}", text);
}

#[test]
fn test_exit_status() {
    let mut session = Session::spawn(&config(20, 3, "/bin/sh", &["-c", "exit 3"]), EventLog::new())
        .expect("Failed to spawn session");
    assert!(drain(&mut session));
    assert_eq!(wait_exit(&mut session), Some(ChildExit::Exited(3)));
    assert!(!session.is_alive());
}
