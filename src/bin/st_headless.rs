//! Headless terminal runner
//!
//! Feeds a byte stream (stdin or a file) through the emulator and prints the
//! resulting screen, as text or as a JSON snapshot.

use std::io::{self, Read};
use std::path::Path;
use std::process::ExitCode;

use st_term::app::logging;
use st_term::{Config, EventLog, Terminal};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<String> = None;
    let mut cols: Option<usize> = None;
    let mut rows: Option<usize> = None;
    let mut scrollback: Option<usize> = None;
    let mut input_file: Option<String> = None;
    let mut output_format = OutputFormat::Text;
    let mut show_events = false;
    let mut show_help = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--cols" => {
                i += 1;
                cols = args.get(i).and_then(|s| s.parse().ok());
            },
            "-r" | "--rows" => {
                i += 1;
                rows = args.get(i).and_then(|s| s.parse().ok());
            },
            "-s" | "--scrollback" => {
                i += 1;
                scrollback = args.get(i).and_then(|s| s.parse().ok());
            },
            "-f" | "--file" => {
                i += 1;
                input_file = args.get(i).cloned();
            },
            "--config" => {
                i += 1;
                config_path = args.get(i).cloned();
            },
            "-j" | "--json" => output_format = OutputFormat::Json,
            "-t" | "--text" => output_format = OutputFormat::Text,
            "-e" | "--events" => show_events = true,
            "-h" | "--help" => show_help = true,
            other => {
                if input_file.is_none() && !other.starts_with('-') {
                    input_file = Some(other.to_string());
                }
            },
        }
        i += 1;
    }

    if show_help {
        print_help();
        return ExitCode::SUCCESS;
    }

    let config = match &config_path {
        Some(path) => match Config::load(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error reading config '{}': {}", path, e);
                return ExitCode::FAILURE;
            },
        },
        None => Config::default(),
    };
    logging::init(config.log_level.as_deref());

    let mut term_config = config.terminal;
    if let Some(cols) = cols {
        term_config.cols = cols;
    }
    if let Some(rows) = rows {
        term_config.rows = rows;
    }
    if let Some(scrollback) = scrollback {
        term_config.scrollback = scrollback;
    }

    let input = match &input_file {
        Some(path) => match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("Error reading file '{}': {}", path, e);
                return ExitCode::FAILURE;
            },
        },
        None => {
            let mut data = Vec::new();
            if let Err(e) = io::stdin().read_to_end(&mut data) {
                eprintln!("Error reading stdin: {}", e);
                return ExitCode::FAILURE;
            }
            data
        },
    };

    let mut term = Terminal::new(&term_config, EventLog::new());
    let used = term.process(&input);
    if used < input.len() {
        tracing::debug!("{} trailing bytes form an incomplete sequence", input.len() - used);
    }

    if show_events {
        for event in term.handler_mut().take() {
            eprintln!("event: {:?}", event);
        }
    }

    match output_format {
        OutputFormat::Text => {
            let (x, y) = term.cursor_position();
            println!("Terminal State ({}x{}):", term.cols(), term.rows());
            println!("Cursor: ({}, {})", y, x);
            if let Some(title) = term.handler().title() {
                println!("Title: {}", title);
            }
            println!("---");
            println!("{}", term.screen_text());
            println!("---");
        },
        OutputFormat::Json => match term.snapshot().to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing snapshot: {}", e);
                return ExitCode::FAILURE;
            },
        },
    }

    ExitCode::SUCCESS
}

#[derive(Clone, Copy)]
enum OutputFormat {
    Text,
    Json,
}

fn print_help() {
    println!("st-headless: run a byte stream through the terminal engine");
    println!();
    println!("Usage: st-headless [OPTIONS] [INPUT_FILE]");
    println!();
    println!("Options:");
    println!("  -c, --cols <N>        Terminal width (default: 80)");
    println!("  -r, --rows <N>        Terminal height (default: 24)");
    println!("  -s, --scrollback <N>  Ring capacity in lines (default: 1000)");
    println!("  -f, --file <PATH>     Read input from file instead of stdin");
    println!("      --config <PATH>   Load settings from a JSON config file");
    println!("  -j, --json            Print the snapshot as JSON");
    println!("  -t, --text            Print the screen as text (default)");
    println!("  -e, --events          Print emitted events to stderr");
    println!("  -h, --help            Show this help message");
}
