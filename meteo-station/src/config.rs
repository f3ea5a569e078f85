//! Station configuration
//!
//! Built from positional command-line arguments:
//! `meteo-station <serverId> <controlPort> [name unit]...`
//!
//! Broadcast destination and journal location come from flags, then from
//! `METEO_BROADCAST_ADDR` / `METEO_BROADCAST_PORT`, then from defaults.

use crate::error::StationError;
use meteo_protocol::{Variable, BROADCAST_ADDRESS, BROADCAST_PORT};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_FREQUENCY: Duration = Duration::from_millis(1000);

pub const ENV_BROADCAST_ADDR: &str = "METEO_BROADCAST_ADDR";
pub const ENV_BROADCAST_PORT: &str = "METEO_BROADCAST_PORT";

pub const USAGE: &str = "usage: meteo-station <serverId> <controlPort> [<variableName> <unit>]... \
[--broadcast-addr <ip>] [--broadcast-port <port>] [--journal-dir <dir>]";

#[derive(Debug, Clone)]
pub struct StationConfig {
    pub server_id: String,
    /// 0 lets the OS pick a port.
    pub control_port: u16,
    pub variables: Vec<Variable>,
    pub broadcast_target: SocketAddr,
    pub initial_frequency: Duration,
    pub journal_dir: Option<PathBuf>,
}

/// temperature/C, humidity/%, pressure/hPa
pub fn default_variables() -> Vec<Variable> {
    vec![
        Variable::new("temperature", 0.0, "C"),
        Variable::new("humidity", 0.0, "%"),
        Variable::new("pressure", 0.0, "hPa"),
    ]
}

impl StationConfig {
    pub fn new(server_id: impl Into<String>, control_port: u16, variables: Vec<Variable>) -> Self {
        Self {
            server_id: server_id.into(),
            control_port,
            variables: if variables.is_empty() { default_variables() } else { variables },
            broadcast_target: SocketAddr::new(IpAddr::V4(BROADCAST_ADDRESS), BROADCAST_PORT),
            initial_frequency: DEFAULT_FREQUENCY,
            journal_dir: None,
        }
    }

    pub fn with_broadcast_target(mut self, target: SocketAddr) -> Self {
        self.broadcast_target = target;
        self
    }

    pub fn with_frequency(mut self, frequency: Duration) -> Self {
        self.initial_frequency = frequency;
        self
    }

    pub fn with_journal_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.journal_dir = Some(dir.into());
        self
    }

    /// Parses process arguments (without the program name), reading
    /// overrides from the real environment.
    pub fn from_args<I>(args: I) -> Result<Self, StationError>
    where
        I: IntoIterator<Item = String>,
    {
        Self::parse(args, |key| std::env::var(key).ok())
    }

    pub fn parse<I, E>(args: I, env: E) -> Result<Self, StationError>
    where
        I: IntoIterator<Item = String>,
        E: Fn(&str) -> Option<String>,
    {
        let mut positional = Vec::new();
        let mut addr_flag = None;
        let mut port_flag = None;
        let mut journal_dir = None;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--broadcast-addr" => addr_flag = Some(flag_value(&arg, args.next())?),
                "--broadcast-port" => port_flag = Some(flag_value(&arg, args.next())?),
                "--journal-dir" => journal_dir = Some(PathBuf::from(flag_value(&arg, args.next())?)),
                flag if flag.starts_with("--") => {
                    return Err(StationError::Config(format!("unknown option {flag}")));
                }
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let server_id = positional
            .next()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| StationError::Config("missing server id".into()))?;
        let control_port = positional
            .next()
            .ok_or_else(|| StationError::Config("missing control port".into()))
            .and_then(|raw| parse_port(&raw, "control port"))?;

        let rest: Vec<String> = positional.collect();
        if rest.len() % 2 != 0 {
            return Err(StationError::Config(
                "variables must be given as <name> <unit> pairs".into(),
            ));
        }
        let variables = rest
            .chunks(2)
            .map(|pair| Variable::new(pair[0].as_str(), 0.0, pair[1].as_str()))
            .collect();

        let mut config = Self::new(server_id, control_port, variables);
        config.journal_dir = journal_dir;

        if let Some(raw) = addr_flag.or_else(|| env(ENV_BROADCAST_ADDR)) {
            let ip = raw
                .trim()
                .parse::<IpAddr>()
                .map_err(|e| StationError::Config(format!("invalid broadcast address '{raw}': {e}")))?;
            config.broadcast_target.set_ip(ip);
        }
        if let Some(raw) = port_flag.or_else(|| env(ENV_BROADCAST_PORT)) {
            config.broadcast_target.set_port(parse_port(&raw, "broadcast port")?);
        }

        Ok(config)
    }
}

fn flag_value(flag: &str, value: Option<String>) -> Result<String, StationError> {
    value.ok_or_else(|| StationError::Config(format!("{flag} needs a value")))
}

fn parse_port(raw: &str, what: &str) -> Result<u16, StationError> {
    raw.trim()
        .parse::<u16>()
        .map_err(|e| StationError::Config(format!("invalid {what} '{raw}': {e}")))
}
