use meteo_protocol::{CodecError, ResponseMessage, ResponseStatus};

/// Failures of one control exchange. None of them reaches an adapter as an
/// error: each is turned into a synthesized response.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Server with ID '{0}' not found or not configured in the broker.")]
    RoutingFailure(String),
    #[error("Server {station} is unreachable: {reason}")]
    Unreachable { station: String, reason: String },
    #[error("No response from server {0}")]
    Timeout(String),
    #[error("Socket error while contacting server {station}: {source}")]
    Io {
        station: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Cannot encode command for server {station}: {source}")]
    Codec {
        station: String,
        #[source]
        source: CodecError,
    },
}

impl BrokerError {
    pub fn status(&self) -> ResponseStatus {
        match self {
            BrokerError::Timeout(_) => ResponseStatus::Timeout,
            _ => ResponseStatus::Error,
        }
    }

    pub fn into_response(self, original_message_id: impl Into<String>) -> ResponseMessage {
        ResponseMessage::new(original_message_id, self.status(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_timeout_everything_else_to_error() {
        let timeout = BrokerError::Timeout("S1".into()).into_response("m-1");
        assert_eq!(timeout.status, ResponseStatus::Timeout);
        assert_eq!(timeout.original_message_id, "m-1");
        assert_eq!(timeout.details, "No response from server S1");

        let routing = BrokerError::RoutingFailure("S9".into()).into_response("m-2");
        assert_eq!(routing.status, ResponseStatus::Error);
        assert!(routing.details.contains("'S9'"));

        let io = BrokerError::Io {
            station: "S2".into(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "busy"),
        };
        assert_eq!(io.status(), ResponseStatus::Error);
    }
}
