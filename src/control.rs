//! Console command parsing and the top-level start/stop orchestration.
//!
//! Mirrors the dedicated stdin-reading task pattern in
//! `examples/cooprefr-bettersys/rust-backend/src/edge/receiver.rs` (its
//! own `running: Arc<AtomicBool>` stop flag), generalized here to the
//! full accepted command set and wired through the system bus instead
//! of a single flag.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::bus::events::ServerCommand;
use crate::bus::SystemBus;

/// Parses one line of stdin input into a command. Unrecognized input is
/// logged and ignored rather than treated as an error.
pub fn parse_command(line: &str) -> Option<ServerCommand> {
    match line.trim() {
        "q" => Some(ServerCommand::Shutdown),
        "p+" => Some(ServerCommand::PriceFeedStart),
        "p-" => Some(ServerCommand::PriceFeedStop),
        "m+" => Some(ServerCommand::MonitorOn),
        "m-" => Some(ServerCommand::MonitorOff),
        "m" => Some(ServerCommand::MonitorToggle),
        "l+" => Some(ServerCommand::LogLevelUp),
        "l-" => Some(ServerCommand::LogLevelDown),
        _ => None,
    }
}

/// Reads stdin line by line, posting each recognized command to the
/// system bus, until EOF or a `Shutdown` command is parsed.
pub async fn run_console(system_bus: Arc<SystemBus>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_command(&line) {
                Some(command) => {
                    let is_shutdown = command == ServerCommand::Shutdown;
                    system_bus.post_command(command);
                    if is_shutdown {
                        return;
                    }
                }
                None => warn!(input = %line, "unrecognized console command"),
            },
            Ok(None) => {
                info!("console input closed");
                return;
            }
            Err(err) => {
                warn!(%err, "console read error");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_documented_command() {
        assert_eq!(parse_command("q"), Some(ServerCommand::Shutdown));
        assert_eq!(parse_command("p+"), Some(ServerCommand::PriceFeedStart));
        assert_eq!(parse_command("p-"), Some(ServerCommand::PriceFeedStop));
        assert_eq!(parse_command("m+"), Some(ServerCommand::MonitorOn));
        assert_eq!(parse_command("m-"), Some(ServerCommand::MonitorOff));
        assert_eq!(parse_command("m"), Some(ServerCommand::MonitorToggle));
        assert_eq!(parse_command("l+"), Some(ServerCommand::LogLevelUp));
        assert_eq!(parse_command("l-"), Some(ServerCommand::LogLevelDown));
    }

    #[test]
    fn unrecognized_input_is_none() {
        assert_eq!(parse_command("bogus"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(parse_command("  q  \n"), Some(ServerCommand::Shutdown));
    }
}
