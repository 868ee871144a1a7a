//! Operator control input.

use std::io::BufRead;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::SessionResult;
use crate::core::realtime::LiveTransport;

/// Capacity of the control command channel.
pub const CONTROL_CHANNEL_CAPACITY: usize = 16;

/// A command typed by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Stop the session
    Quit,
    /// Send a complete user turn
    Text(String),
    /// Requested interruption; interruptions are detected by the server
    Interrupt,
    /// Anything else
    Unknown(String),
}

impl ControlCommand {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };
        let command = match head {
            "/quit" | "/exit" => Self::Quit,
            "/interrupt" => Self::Interrupt,
            "/text" if !rest.is_empty() => Self::Text(rest.to_string()),
            _ => Self::Unknown(line.to_string()),
        };
        Some(command)
    }
}

/// Forward parsed lines from a blocking `reader` into `tx` until end of
/// input, which is reported as [`ControlCommand::Quit`].
///
/// Meant for a dedicated thread reading the terminal.
pub fn forward_commands<R: BufRead>(reader: R, tx: &mpsc::Sender<ControlCommand>) -> std::io::Result<()> {
    for line in reader.lines() {
        let Some(command) = ControlCommand::parse(&line?) else {
            continue;
        };
        let quit = command == ControlCommand::Quit;
        if tx.blocking_send(command).is_err() || quit {
            return Ok(());
        }
    }
    let _ = tx.blocking_send(ControlCommand::Quit);
    Ok(())
}

/// Read operator commands from stdin on a background thread.
pub fn spawn_stdin_reader(tx: mpsc::Sender<ControlCommand>) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("stdin-control".to_string())
        .spawn(move || {
            if let Err(e) = forward_commands(std::io::stdin().lock(), &tx) {
                warn!("stdin read failed: {}", e);
                let _ = tx.blocking_send(ControlCommand::Quit);
            }
        })
}

/// Drain control commands until quit, channel close, or cancellation.
pub(super) async fn run_control_loop(
    transport: Arc<dyn LiveTransport>,
    mut commands: mpsc::Receiver<ControlCommand>,
    cancel: CancellationToken,
) -> SessionResult<()> {
    loop {
        let command = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            command = commands.recv() => command,
        };
        match command {
            None | Some(ControlCommand::Quit) => {
                info!("Quit requested");
                cancel.cancel();
                return Ok(());
            }
            Some(ControlCommand::Text(text)) => {
                debug!("sending text turn: {}", text);
                transport.send_turn(&text).await?;
            }
            Some(ControlCommand::Interrupt) => {
                info!("Interruptions are detected by the server from your voice; just start speaking");
            }
            Some(ControlCommand::Unknown(line)) => {
                warn!("Unknown command {:?}; use /text <message>, /interrupt or /quit", line);
            }
        }
    }
}
