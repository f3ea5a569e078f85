//! Control command handling
//!
//! Turns one raw control datagram into at most one response. Every failure
//! (undecodable payload, unknown command, bad parameter) ends up as an
//! `ERROR`/`ERROR_PARSING` response; nothing here can stop the listener.

use crate::state::{StationSettings, StationState};
use meteo_protocol::{
    decode_control, Command, CommandError, ResponseMessage, ResponseStatus, UNKNOWN_MESSAGE_ID,
};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct Reply {
    pub response: ResponseMessage,
    /// The listener must shut down once the response is sent.
    pub stop: bool,
}

impl Reply {
    fn new(response: ResponseMessage) -> Self {
        Self { response, stop: false }
    }
}

/// `None` when the message targets another station.
pub fn handle_datagram(state: &StationState, raw: &str) -> Option<Reply> {
    let msg = match decode_control(raw) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("undecodable control message: {}", e);
            return Some(Reply::new(ResponseMessage::new(
                UNKNOWN_MESSAGE_ID,
                ResponseStatus::ErrorParsing,
                format!("Error parsing control message: {e}"),
            )));
        }
    };

    if !state.is_addressed(&msg.target_server_id) {
        debug!(
            "ignoring {} addressed to {} (this is {})",
            msg.command, msg.target_server_id, state.server_id
        );
        return None;
    }

    let outcome = Command::try_from(&msg).and_then(|cmd| {
        let details = state.try_update(|settings| apply(settings, &cmd, &state.server_id))?;
        Ok((cmd, details))
    });

    match outcome {
        Ok((cmd, details)) => {
            info!("{} applied: {}", msg.command, details);
            Some(Reply {
                response: ResponseMessage::new(msg.message_id, ResponseStatus::Ok, details),
                stop: cmd == Command::Stop,
            })
        }
        Err(e) => {
            warn!("{} rejected: {}", msg.command, e);
            Some(Reply::new(ResponseMessage::new(
                msg.message_id,
                ResponseStatus::Error,
                e.to_string(),
            )))
        }
    }
}

/// Applies one command to a settings snapshot, returning the response details.
pub fn apply(settings: &mut StationSettings, cmd: &Command, server_id: &str) -> Result<String, CommandError> {
    match cmd {
        Command::SetEncoding { format } => {
            settings.encoding = *format;
            Ok(format!("Encoding set to {format}"))
        }
        Command::SetFrequency { ms } => {
            settings.frequency = Duration::from_millis(*ms);
            Ok(format!("Broadcast frequency set to {ms}ms"))
        }
        Command::SetUnit { name, unit } => match settings.variable_mut(name) {
            Some(var) => {
                var.unit = unit.clone();
                Ok(format!("Unit for {} changed to {}", var.name, unit))
            }
            None => Err(CommandError::InvalidParameter(format!(
                "Variable {name} not managed by this server."
            ))),
        },
        Command::Toggle { active } => {
            settings.sending = *active;
            Ok(if *active {
                "Data sending activated".to_string()
            } else {
                "Data sending deactivated".to_string()
            })
        }
        Command::Stop => {
            settings.running = false;
            settings.sending = false;
            Ok(format!("Server {server_id} stopping."))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StationConfig;
    use crate::state::SharedState;
    use meteo_protocol::{encode_control, ControlMessage, EncodingFormat, Variable};
    use serde_json::json;

    fn station() -> SharedState {
        let config = StationConfig::new(
            "S1",
            0,
            vec![Variable::new("temperature", 0.0, "C"), Variable::new("humidity", 0.0, "%")],
        );
        StationState::new("S1", crate::state::StationSettings::initial(&config))
    }

    fn send(state: &StationState, command: &str, params: serde_json::Value) -> Reply {
        let mut msg = ControlMessage::new(command, "S1");
        msg.parameters = params.as_object().cloned().unwrap_or_default();
        handle_datagram(state, &encode_control(&msg).unwrap()).unwrap()
    }

    #[test]
    fn test_set_frequency_updates_settings() {
        let state = station();
        let reply = send(&state, "SET_FREQUENCY", json!({"frequency": 2000}));
        assert_eq!(reply.response.status, ResponseStatus::Ok);
        assert!(reply.response.details.contains("2000"));
        assert_eq!(state.snapshot().frequency, Duration::from_millis(2000));
        assert!(!reply.stop);
    }

    #[test]
    fn test_set_unit_changes_only_named_variable() {
        let state = station();
        let reply = send(&state, "SET_VARIABLE_UNIT", json!({"variableName": "TEMPERATURE", "newUnit": "K"}));
        assert!(reply.response.is_ok());
        assert_eq!(reply.response.details, "Unit for temperature changed to K");
        let settings = state.snapshot();
        assert_eq!(settings.variables[0].unit, "K");
        assert_eq!(settings.variables[1].unit, "%");
    }

    #[test]
    fn test_unknown_variable_is_error_and_state_unchanged() {
        let state = station();
        let before = state.snapshot();
        let reply = send(&state, "SET_UNIT", json!({"variableName": "wind", "newUnit": "m/s"}));
        assert_eq!(reply.response.status, ResponseStatus::Error);
        assert_eq!(reply.response.details, "Variable wind not managed by this server.");
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn test_encoding_and_toggle() {
        let state = station();
        assert!(send(&state, "set_encoding", json!({"encoding": "xml"})).response.is_ok());
        assert_eq!(state.snapshot().encoding, EncodingFormat::Xml);

        let reply = send(&state, "TOGGLE_SENDING_DATA", json!({"active": false}));
        assert_eq!(reply.response.details, "Data sending deactivated");
        assert!(!state.snapshot().sending);

        let reply = send(&state, "TOGGLE_SENDING_DATA", json!({"active": 1}));
        assert_eq!(reply.response.status, ResponseStatus::Error);
        assert!(!state.snapshot().sending);
    }

    #[test]
    fn test_stop_requests_listener_shutdown() {
        let state = station();
        let reply = send(&state, "STOP_SERVER_PROCESS", json!({}));
        assert!(reply.stop);
        assert_eq!(reply.response.details, "Server S1 stopping.");
        let settings = state.snapshot();
        assert!(!settings.running);
        assert!(!settings.sending);
    }

    #[test]
    fn test_unknown_command_names_it() {
        let state = station();
        let reply = send(&state, "SELF_DESTRUCT", json!({}));
        assert_eq!(reply.response.status, ResponseStatus::Error);
        assert_eq!(reply.response.details, "Unknown command: SELF_DESTRUCT");
    }

    #[test]
    fn test_garbage_yields_error_parsing_with_placeholder_id() {
        let state = station();
        let reply = handle_datagram(&state, "{not json").unwrap();
        assert_eq!(reply.response.status, ResponseStatus::ErrorParsing);
        assert_eq!(reply.response.original_message_id, "N/A");
    }

    #[test]
    fn test_other_targets_are_ignored() {
        let state = station();
        let msg = ControlMessage::new("STOP_SERVER_PROCESS", "S2");
        assert!(handle_datagram(&state, &encode_control(&msg).unwrap()).is_none());
        assert!(state.snapshot().running);

        let broadcast = ControlMessage::new("TOGGLE_SENDING_DATA", "all").with_parameter("active", false);
        let reply = handle_datagram(&state, &encode_control(&broadcast).unwrap()).unwrap();
        assert_eq!(reply.response.original_message_id, broadcast.message_id);
    }
}
