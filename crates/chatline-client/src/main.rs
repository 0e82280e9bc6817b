//! chatline terminal client
//!
//! Usage: `chatline <address> <port> <username>`, or `chatline <username>`
//! with a `server` section in `chatline.yaml`.
//! - Each stdin line is sent as a chat message
//! - `/quit` (or EOF) closes the session
//! - Logs go to stderr, filtered by `RUST_LOG`

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

use chatline_client::config::{self, ClientConfig};
use chatline_client::{Session, SessionListener};
use chatline_core::error::{ChatError, ErrorCode, Result};
use chatline_core::protocol::Timestamp;

const CONFIG_PATH: &str = "chatline.yaml";
const USAGE: &str = "usage: chatline <address> <port> <username> | chatline <username>";

/// Prints session events; tells the input loop when the session drops.
struct Terminal {
    lost: mpsc::UnboundedSender<String>,
}

impl SessionListener for Terminal {
    fn on_logged_in(&self, username: &str, at: Timestamp) {
        println!("[{at}] logged in as {username}");
    }

    fn on_message(&self, originator: &str, content: &str, at: Timestamp) {
        println!("[{at}] <{originator}> {content}");
    }

    fn on_error(&self, code: Option<ErrorCode>, detail: &str) {
        match code {
            Some(code) => eprintln!("error {code}: {detail}"),
            None => eprintln!("error: {detail}"),
        }
    }

    fn on_disconnected(&self, detail: &str) {
        let _ = self.lost.send(detail.to_string());
    }

    fn on_user_joined(&self, username: &str, at: Timestamp) {
        println!("[{at}] * {username} joined");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("chatline: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cfg = if Path::new(CONFIG_PATH).exists() {
        config::load_from_file(CONFIG_PATH)?
    } else {
        ClientConfig::default()
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (address, port, username) = match (args.as_slice(), &cfg.server) {
        ([address, port, username], _) => (address.clone(), port.clone(), username.clone()),
        ([username], Some(server)) => (
            server.address.clone(),
            server.port.to_string(),
            username.clone(),
        ),
        _ => return Err(ChatError::Rejected(USAGE.into())),
    };

    let (lost_tx, mut lost_rx) = mpsc::unbounded_channel();
    let session = Session::new(cfg, Arc::new(Terminal { lost: lost_tx }))?;
    session.login(&address, &port, &username)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(_) = lost_rx.recv() => {
                eprintln!("disconnected");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim() == "/quit" => break,
                Ok(Some(line)) => {
                    if let Err(e) = session.send_message(&line) {
                        eprintln!("{e}");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    session.close();
                    return Err(ChatError::ReadFailure(e));
                }
            },
        }
    }

    session.close();
    Ok(())
}
