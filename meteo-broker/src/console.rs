//! Operator console
//!
//! Line-oriented adapter on top of [`StationGateway`]. Parsing is a pure
//! function so the command grammar can be tested without sockets.

use crate::StationGateway;
use meteo_protocol::{Command, DistributionMessage, EncodingFormat, ResponseMessage};
use std::fmt::Write as _;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub const HELP: &str = "\
Commands:
  HELP                                   show this help
  LIST_DATA                              latest reading of every station
  SET_ENCODING <serverId> <JSON|XML>     change broadcast encoding
  SET_FREQUENCY <serverId> <ms>          change broadcast period
  SET_UNIT <serverId> <variable> <unit>  rename a variable's unit
  ACTIVATE_SERVER <serverId>             resume broadcasting
  DEACTIVATE_SERVER <serverId>           pause broadcasting
  STOP_SERVER <serverId>                 stop the station process
  EXIT                                   quit the broker
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleAction {
    Help,
    ListData,
    Send { target: String, command: Command },
    Exit,
    Empty,
    /// Message to show the operator.
    Invalid(String),
}

/// How the console loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// Operator typed EXIT.
    Exit,
    /// Input reached end of file.
    Closed,
}

pub fn parse(line: &str) -> ConsoleAction {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(first) = parts.first() else {
        return ConsoleAction::Empty;
    };
    let keyword = first.to_ascii_uppercase();
    let args = &parts[1..];

    let usage = |form: &str| ConsoleAction::Invalid(format!("Usage: {keyword} {form}"));
    let send = |target: &str, command: Command| ConsoleAction::Send {
        target: target.to_ascii_uppercase(),
        command,
    };

    match (keyword.as_str(), args) {
        ("HELP", _) => ConsoleAction::Help,
        ("LIST_DATA", _) => ConsoleAction::ListData,
        ("EXIT", _) => ConsoleAction::Exit,
        ("SET_ENCODING", [target, format]) => match format.parse::<EncodingFormat>() {
            Ok(format) => send(*target, Command::SetEncoding { format }),
            Err(e) => ConsoleAction::Invalid(e),
        },
        ("SET_ENCODING", _) => usage("<serverId> <JSON|XML>"),
        ("SET_FREQUENCY", [target, ms]) => match ms.parse::<u64>() {
            Ok(ms) if ms > 0 => send(*target, Command::SetFrequency { ms }),
            _ => ConsoleAction::Invalid(format!("Invalid frequency: {ms}")),
        },
        ("SET_FREQUENCY", _) => usage("<serverId> <ms>"),
        ("SET_UNIT", [target, name, unit]) => send(
            *target,
            Command::SetUnit {
                name: name.to_string(),
                unit: unit.to_string(),
            },
        ),
        ("SET_UNIT", _) => usage("<serverId> <variable> <unit>"),
        ("ACTIVATE_SERVER", [target]) => send(*target, Command::Toggle { active: true }),
        ("DEACTIVATE_SERVER", [target]) => send(*target, Command::Toggle { active: false }),
        ("STOP_SERVER", [target]) => send(*target, Command::Stop),
        ("ACTIVATE_SERVER" | "DEACTIVATE_SERVER" | "STOP_SERVER", _) => usage("<serverId>"),
        _ => ConsoleAction::Invalid(format!("Unknown command: {first}")),
    }
}

pub fn render_latest(readings: &[DistributionMessage]) -> String {
    if readings.is_empty() {
        return "No data received yet.\n".to_string();
    }
    let mut out = String::new();
    for msg in readings {
        let at = OffsetDateTime::from_unix_timestamp_nanos(i128::from(msg.timestamp) * 1_000_000)
            .ok()
            .and_then(|t| t.format(&Rfc3339).ok())
            .unwrap_or_else(|| msg.timestamp.to_string());
        let _ = writeln!(out, "Server {} @ {} ({})", msg.server_id, at, msg.encoding_format);
        for var in &msg.variables {
            let _ = writeln!(out, "  {var}");
        }
    }
    out
}

pub fn render_response(response: &ResponseMessage) -> String {
    format!("[{}] {}\n", response.status, response.details)
}

/// Reads commands until EXIT or end of input.
pub async fn run<G, R, W>(gateway: &G, input: R, mut output: W) -> std::io::Result<ConsoleExit>
where
    G: StationGateway,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    output.write_all(HELP.as_bytes()).await?;
    output.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let text = match parse(&line) {
            ConsoleAction::Help => HELP.to_string(),
            ConsoleAction::ListData => render_latest(&gateway.latest_data()),
            ConsoleAction::Send { target, command } => {
                let response = gateway
                    .send_command(&target, command.wire_name(), command.parameters())
                    .await;
                render_response(&response)
            }
            ConsoleAction::Exit => return Ok(ConsoleExit::Exit),
            ConsoleAction::Empty => continue,
            ConsoleAction::Invalid(message) => format!("{message}\n"),
        };
        output.write_all(text.as_bytes()).await?;
        output.flush().await?;
    }

    Ok(ConsoleExit::Closed)
}
