//! RAX FTP Client - Entry Point
//!
//! Terminal front-end: reads command lines from stdin and drives a
//! `Session`. All protocol state lives in the library; this shell only
//! maps input lines to session operations and renders replies and
//! progress.

use log::info;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use rax_ftp_client::Session;
use rax_ftp_client::config::ClientConfig;
use rax_ftp_client::control::{Direction, TraceSink};
use rax_ftp_client::error::FtpError;

/// Prints every received reply line, like a classic line-mode client.
struct StdoutTrace;

impl TraceSink for StdoutTrace {
    fn line(&mut self, direction: Direction, text: &str) {
        if direction == Direction::Received {
            println!("{}", text);
        }
    }
}

fn main() {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    let mut config = match ClientConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Optional positional overrides: rax-ftp-client [host] [port]
    let mut args = std::env::args().skip(1);
    if let Some(host) = args.next() {
        config.host = host;
    }
    if let Some(port) = args.next() {
        match port.parse() {
            Ok(port) => config.port = port,
            Err(_) => {
                eprintln!("invalid port: {}", port);
                std::process::exit(1);
            }
        }
    }

    info!("connecting to {}:{}", config.host, config.port);
    let mut session = match Session::connect_with_trace(&config, Some(Box::new(StdoutTrace))) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("connection failed: {}", e);
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match run_command(&mut session, input) {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => {
                eprintln!("error: {}", e);
                if e.is_fatal() {
                    std::process::exit(1);
                }
            }
        }
    }
}

/// Dispatches one input line. Returns `true` when the session ended.
fn run_command(session: &mut Session, input: &str) -> Result<bool, FtpError> {
    let mut parts = input.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("").to_ascii_uppercase();
    let arg = parts.next().unwrap_or("").trim();

    match cmd.as_str() {
        "QUIT" => {
            session.quit()?;
            Ok(true)
        }
        "LOGIN" => {
            // LOGIN <user> <pass>
            let mut fields = arg.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some(user), Some(pass)) => session.login(user, pass)?,
                _ => eprintln!("usage: LOGIN <user> <pass>"),
            }
            Ok(false)
        }
        "PASV" => {
            session.enter_passive()?;
            Ok(false)
        }
        "PORT" => {
            match rax_ftp_client::transfer::negotiate::parse_host_port_fields(arg) {
                Some(endpoint) => session.enter_active(*endpoint.ip(), endpoint.port())?,
                None => eprintln!("usage: PORT h1,h2,h3,h4,p1,p2"),
            }
            Ok(false)
        }
        "LIST" => {
            let directory = if arg.is_empty() { None } else { Some(arg) };
            for line in session.list(directory)? {
                println!("{}", line);
            }
            Ok(false)
        }
        "RETR" => {
            let (remote, resume) = split_resume(arg);
            if remote.is_empty() {
                eprintln!("usage: RETR <remote> [-resume]");
                return Ok(false);
            }
            let local = PathBuf::from(remote.rsplit('/').next().unwrap_or(remote));
            let mut progress = progress_printer();
            if resume {
                session.retrieve_resumable(remote, &local, &mut progress)?;
            } else {
                session.retrieve(remote, &local, &mut progress)?;
            }
            println!();
            Ok(false)
        }
        "STOR" => {
            let (path, resume) = split_resume(arg);
            if path.is_empty() {
                eprintln!("usage: STOR <local> [-resume]");
                return Ok(false);
            }
            let local = Path::new(path);
            let remote = match local.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => {
                    eprintln!("usage: STOR <local> [-resume]");
                    return Ok(false);
                }
            };
            let mut progress = progress_printer();
            if resume {
                session.store_resumable(local, &remote, &mut progress)?;
            } else {
                session.store(local, &remote, &mut progress)?;
            }
            println!();
            Ok(false)
        }
        // Everything else goes over the wire verbatim: TYPE, SYST,
        // NOOP, PWD, CWD, ... The trace sink prints the reply.
        _ => {
            session.execute(input)?;
            Ok(false)
        }
    }
}

/// Splits a trailing `-resume` flag off a transfer argument.
fn split_resume(arg: &str) -> (&str, bool) {
    match arg.strip_suffix("-resume") {
        Some(head) => (head.trim(), true),
        None => (arg.trim(), false),
    }
}

fn progress_printer() -> impl FnMut(u64, u64) {
    |moved: u64, total: u64| {
        if total > 0 {
            let percent = moved as f64 * 100.0 / total as f64;
            print!("\rtransferred {}/{} bytes ({:.1}%)", moved, total, percent);
        } else {
            print!("\rtransferred {} bytes", moved);
        }
        let _ = io::stdout().flush();
    }
}
