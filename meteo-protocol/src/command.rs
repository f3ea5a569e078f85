//! Typed control commands
//!
//! The wire keeps the loose `{command, parameters}` shape; everything past the
//! protocol boundary works with [`Command`].

use crate::models::{ControlMessage, EncodingFormat};
use serde_json::{Map, Value};

pub const SET_ENCODING: &str = "SET_ENCODING";
pub const SET_FREQUENCY: &str = "SET_FREQUENCY";
pub const SET_VARIABLE_UNIT: &str = "SET_VARIABLE_UNIT";
pub const SET_UNIT: &str = "SET_UNIT";
pub const TOGGLE_SENDING_DATA: &str = "TOGGLE_SENDING_DATA";
pub const STOP_SERVER_PROCESS: &str = "STOP_SERVER_PROCESS";

/// Validation failures while turning a control message into a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("{0}")]
    InvalidParameter(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetEncoding { format: EncodingFormat },
    SetFrequency { ms: u64 },
    SetUnit { name: String, unit: String },
    Toggle { active: bool },
    Stop,
}

impl Command {
    /// Parses a command name (case-insensitive) and its parameter bag.
    pub fn parse(command: &str, parameters: &Map<String, Value>) -> Result<Self, CommandError> {
        match command.trim().to_ascii_uppercase().as_str() {
            SET_ENCODING => {
                let raw = required_str(parameters, "encoding")?;
                let format = raw
                    .parse::<EncodingFormat>()
                    .map_err(CommandError::InvalidParameter)?;
                Ok(Command::SetEncoding { format })
            }
            SET_FREQUENCY => Ok(Command::SetFrequency {
                ms: frequency_ms(parameters.get("frequency"))?,
            }),
            SET_VARIABLE_UNIT | SET_UNIT => Ok(Command::SetUnit {
                name: required_str(parameters, "variableName")?.to_string(),
                unit: required_str(parameters, "newUnit")?.to_string(),
            }),
            TOGGLE_SENDING_DATA => match parameters.get("active") {
                Some(Value::Bool(active)) => Ok(Command::Toggle { active: *active }),
                other => Err(CommandError::InvalidParameter(format!(
                    "Invalid type for 'active' parameter: {}",
                    type_name(other)
                ))),
            },
            STOP_SERVER_PROCESS => Ok(Command::Stop),
            _ => Err(CommandError::UnknownCommand(command.to_string())),
        }
    }

    /// Command name written on the wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Command::SetEncoding { .. } => SET_ENCODING,
            Command::SetFrequency { .. } => SET_FREQUENCY,
            Command::SetUnit { .. } => SET_VARIABLE_UNIT,
            Command::Toggle { .. } => TOGGLE_SENDING_DATA,
            Command::Stop => STOP_SERVER_PROCESS,
        }
    }

    pub fn parameters(&self) -> Map<String, Value> {
        let mut params = Map::new();
        match self {
            Command::SetEncoding { format } => {
                params.insert("encoding".into(), Value::from(format.tag()));
            }
            Command::SetFrequency { ms } => {
                params.insert("frequency".into(), Value::from(*ms));
            }
            Command::SetUnit { name, unit } => {
                params.insert("variableName".into(), Value::from(name.as_str()));
                params.insert("newUnit".into(), Value::from(unit.as_str()));
            }
            Command::Toggle { active } => {
                params.insert("active".into(), Value::from(*active));
            }
            Command::Stop => {}
        }
        params
    }

    pub fn into_control(self, target_server_id: impl Into<String>) -> ControlMessage {
        let mut msg = ControlMessage::new(self.wire_name(), target_server_id);
        msg.parameters = self.parameters();
        msg
    }
}

impl TryFrom<&ControlMessage> for Command {
    type Error = CommandError;

    fn try_from(msg: &ControlMessage) -> Result<Self, Self::Error> {
        Command::parse(&msg.command, &msg.parameters)
    }
}

fn required_str<'a>(parameters: &'a Map<String, Value>, key: &str) -> Result<&'a str, CommandError> {
    match parameters.get(key) {
        Some(Value::String(s)) => Ok(s.as_str()),
        other => Err(CommandError::InvalidParameter(format!(
            "Invalid type for '{key}' parameter: {}",
            type_name(other)
        ))),
    }
}

/// Positive integer, either as a JSON number or a numeric string.
fn frequency_ms(value: Option<&Value>) -> Result<u64, CommandError> {
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64).map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        other => {
            return Err(CommandError::InvalidParameter(format!(
                "Invalid frequency type: {}",
                type_name(other)
            )))
        }
    };
    match parsed {
        Some(ms) if ms > 0 => Ok(ms as u64),
        Some(ms) => Err(CommandError::InvalidParameter(format!("Invalid frequency: {ms}"))),
        None => Err(CommandError::InvalidParameter(format!(
            "Invalid frequency: {}",
            value.map(Value::to_string).unwrap_or_default()
        ))),
    }
}

fn type_name(value: Option<&Value>) -> &'static str {
    match value {
        None | Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_frequency_accepts_numbers_and_numeric_strings() {
        assert_eq!(
            Command::parse("SET_FREQUENCY", &params(json!({"frequency": 2000}))),
            Ok(Command::SetFrequency { ms: 2000 })
        );
        assert_eq!(
            Command::parse("set_frequency", &params(json!({"frequency": "500"}))),
            Ok(Command::SetFrequency { ms: 500 })
        );
        assert_eq!(
            Command::parse("SET_FREQUENCY", &params(json!({"frequency": 1500.0}))),
            Ok(Command::SetFrequency { ms: 1500 })
        );
    }

    #[test]
    fn test_frequency_rejects_non_positive_and_wrong_types() {
        for bad in [json!(0), json!(-5), json!("fast"), json!(true), json!(12.5)] {
            let result = Command::parse("SET_FREQUENCY", &params(json!({ "frequency": bad })));
            assert!(matches!(result, Err(CommandError::InvalidParameter(_))), "{bad} accepted");
        }
        let missing = Command::parse("SET_FREQUENCY", &Map::new()).unwrap_err();
        assert_eq!(missing.to_string(), "Invalid frequency type: null");
    }

    #[test]
    fn test_encoding_is_case_insensitive() {
        assert_eq!(
            Command::parse("SET_ENCODING", &params(json!({"encoding": "xml"}))),
            Ok(Command::SetEncoding { format: EncodingFormat::Xml })
        );
        let err = Command::parse("SET_ENCODING", &params(json!({"encoding": "YAML"}))).unwrap_err();
        assert_eq!(err.to_string(), "Invalid encoding: YAML");
    }

    #[test]
    fn test_both_unit_command_spellings() {
        let p = params(json!({"variableName": "temperature", "newUnit": "K"}));
        let expected = Command::SetUnit { name: "temperature".into(), unit: "K".into() };
        assert_eq!(Command::parse("SET_VARIABLE_UNIT", &p), Ok(expected.clone()));
        assert_eq!(Command::parse("SET_UNIT", &p), Ok(expected));
        assert!(Command::parse("SET_UNIT", &params(json!({"variableName": "temperature"}))).is_err());
    }

    #[test]
    fn test_toggle_requires_boolean() {
        assert_eq!(
            Command::parse("TOGGLE_SENDING_DATA", &params(json!({"active": false}))),
            Ok(Command::Toggle { active: false })
        );
        let err = Command::parse("TOGGLE_SENDING_DATA", &params(json!({"active": "yes"}))).unwrap_err();
        assert_eq!(err.to_string(), "Invalid type for 'active' parameter: string");
    }

    #[test]
    fn test_unknown_command_is_named() {
        let err = Command::parse("REBOOT", &Map::new()).unwrap_err();
        assert_eq!(err, CommandError::UnknownCommand("REBOOT".into()));
        assert_eq!(err.to_string(), "Unknown command: REBOOT");
    }

    #[test]
    fn test_into_control_uses_wire_names() {
        let msg = Command::SetUnit { name: "humidity".into(), unit: "ratio".into() }.into_control("S2");
        assert_eq!(msg.command, "SET_VARIABLE_UNIT");
        assert_eq!(msg.target_server_id, "S2");
        assert_eq!(msg.parameters["newUnit"], "ratio");
        assert_eq!(Command::try_from(&msg), Ok(Command::SetUnit { name: "humidity".into(), unit: "ratio".into() }));

        let stop = Command::Stop.into_control("ALL");
        assert_eq!(stop.command, "STOP_SERVER_PROCESS");
        assert!(stop.parameters.is_empty());
    }
}
