use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// One named reading with its unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: f64,
    pub unit: String,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
        }
    }

    /// Same variable carrying a fresh value.
    pub fn with_value(&self, value: f64) -> Self {
        Self {
            name: self.name.clone(),
            value,
            unit: self.unit.clone(),
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.2} {}", self.name, self.value, self.unit)
    }
}

/// Payload encoding of a distribution message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EncodingFormat {
    #[default]
    Json,
    Xml,
}

impl EncodingFormat {
    /// Envelope tag written before the `:` separator.
    pub fn tag(self) -> &'static str {
        match self {
            EncodingFormat::Json => "JSON",
            EncodingFormat::Xml => "XML",
        }
    }

    /// Exact (case-sensitive) match of an envelope tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "JSON" => Some(EncodingFormat::Json),
            "XML" => Some(EncodingFormat::Xml),
            _ => None,
        }
    }
}

impl fmt::Display for EncodingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for EncodingFormat {
    type Err = String;

    /// Case-insensitive, as accepted from operators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JSON" => Ok(EncodingFormat::Json),
            "XML" => Ok(EncodingFormat::Xml),
            _ => Err(format!("Invalid encoding: {s}")),
        }
    }
}

/// Discriminator carried by every message on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Distribution,
    Control,
    Response,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Distribution => "DISTRIBUTION",
            MessageType::Control => "CONTROL",
            MessageType::Response => "RESPONSE",
        }
    }

    fn distribution() -> Self {
        MessageType::Distribution
    }

    fn control() -> Self {
        MessageType::Control
    }

    fn response() -> Self {
        MessageType::Response
    }
}

/// Readings broadcast by one station on one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionMessage {
    pub message_id: String,
    pub timestamp: i64,
    pub server_id: String,
    pub encoding_format: EncodingFormat,
    #[serde(default = "MessageType::distribution")]
    pub message_type: MessageType,
    pub variables: Vec<Variable>,
}

impl DistributionMessage {
    pub fn new(server_id: impl Into<String>, encoding_format: EncodingFormat, variables: Vec<Variable>) -> Self {
        Self {
            message_id: new_message_id(),
            timestamp: now_millis(),
            server_id: server_id.into(),
            encoding_format,
            message_type: MessageType::Distribution,
            variables,
        }
    }

    /// Case-insensitive lookup of a reading by name.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name.eq_ignore_ascii_case(name))
    }
}

/// Command sent by a broker to one station (or `ALL`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlMessage {
    #[serde(default = "new_message_id")]
    pub message_id: String,
    #[serde(default = "now_millis")]
    pub timestamp: i64,
    pub command: String,
    pub target_server_id: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub encoding_format: EncodingFormat,
    #[serde(default = "MessageType::control")]
    pub message_type: MessageType,
}

impl ControlMessage {
    pub fn new(command: impl Into<String>, target_server_id: impl Into<String>) -> Self {
        Self {
            message_id: new_message_id(),
            timestamp: now_millis(),
            command: command.into(),
            target_server_id: target_server_id.into(),
            parameters: Map::new(),
            encoding_format: EncodingFormat::Json,
            message_type: MessageType::Control,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Terminal outcome of a control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Ok,
    Error,
    ErrorParsing,
    Timeout,
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResponseStatus::Ok => "OK",
            ResponseStatus::Error => "ERROR",
            ResponseStatus::ErrorParsing => "ERROR_PARSING",
            ResponseStatus::Timeout => "TIMEOUT",
        };
        f.write_str(s)
    }
}

/// Reply to a control message, built by a station or synthesized by a broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMessage {
    #[serde(default = "new_message_id")]
    pub message_id: String,
    #[serde(default = "now_millis")]
    pub timestamp: i64,
    pub original_message_id: String,
    pub status: ResponseStatus,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub encoding_format: EncodingFormat,
    #[serde(default = "MessageType::response")]
    pub message_type: MessageType,
}

impl ResponseMessage {
    pub fn new(original_message_id: impl Into<String>, status: ResponseStatus, details: impl Into<String>) -> Self {
        Self {
            message_id: new_message_id(),
            timestamp: now_millis(),
            original_message_id: original_message_id.into(),
            status,
            details: details.into(),
            encoding_format: EncodingFormat::Json,
            message_type: MessageType::Response,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_display_uses_two_decimals() {
        let var = Variable::new("temperature", 21.456, "C");
        assert_eq!(var.to_string(), "temperature: 21.46 C");
    }

    #[test]
    fn test_encoding_tag_is_case_sensitive_but_parse_is_not() {
        assert_eq!(EncodingFormat::from_tag("XML"), Some(EncodingFormat::Xml));
        assert_eq!(EncodingFormat::from_tag("xml"), None);
        assert_eq!("xml".parse::<EncodingFormat>(), Ok(EncodingFormat::Xml));
        assert!("yaml".parse::<EncodingFormat>().is_err());
    }

    #[test]
    fn test_response_status_wire_names() {
        let json = serde_json::to_string(&ResponseStatus::ErrorParsing).unwrap();
        assert_eq!(json, "\"ERROR_PARSING\"");
        let status: ResponseStatus = serde_json::from_str("\"TIMEOUT\"").unwrap();
        assert_eq!(status, ResponseStatus::Timeout);
    }

    #[test]
    fn test_control_message_defaults_when_fields_missing() {
        let msg: ControlMessage = serde_json::from_str(
            r#"{"command":"SET_FREQUENCY","targetServerId":"S1","parameters":{"frequency":2000}}"#,
        )
        .unwrap();
        assert!(!msg.message_id.is_empty());
        assert!(msg.timestamp > 0);
        assert_eq!(msg.message_type, MessageType::Control);
        assert_eq!(msg.parameters["frequency"], 2000);
    }

    #[test]
    fn test_distribution_message_uses_camel_case_fields() {
        let msg = DistributionMessage::new("S1", EncodingFormat::Json, vec![Variable::new("humidity", 40.0, "%")]);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["serverId"], "S1");
        assert_eq!(value["encodingFormat"], "JSON");
        assert_eq!(value["messageType"], "DISTRIBUTION");
        assert!(value.get("messageId").is_some());
        assert_eq!(msg.variable("HUMIDITY").map(|v| v.unit.as_str()), Some("%"));
    }
}
