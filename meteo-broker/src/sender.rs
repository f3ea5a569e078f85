/**
 * COMMAND SENDER - control channel client of the broker
 *
 * ROLE :
 * Sends one ControlMessage to a station and waits for its ResponseMessage.
 *
 * OPERATION :
 * - Route lookup first: an unknown station fails before any socket is opened
 * - The target id is rewritten to its configured spelling, since stations
 *   compare their own id exactly
 * - Fresh ephemeral socket per call, so concurrent calls never share replies
 * - One deadline per call; replies whose originalMessageId does not match
 *   the sent messageId are dropped while the deadline keeps running
 * - Every failure becomes a synthesized response (ERROR or TIMEOUT)
 */

use crate::error::BrokerError;
use crate::routing::RoutingTable;
use meteo_protocol::{
    decode_response, encode_control, Command, ControlMessage, PayloadJournal, ResponseMessage, ResponseStatus,
    MAX_DATAGRAM_SIZE, UNKNOWN_MESSAGE_ID,
};
use serde_json::{Map, Value};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

const SENT_CONTROL_LOG: &str = "broker_sent_control.log";
const RECEIVED_RESPONSE_LOG: &str = "broker_received_response.log";

pub struct CommandSender {
    routes: RoutingTable,
    timeout: Duration,
    journal: PayloadJournal,
}

impl CommandSender {
    pub fn new(routes: RoutingTable, timeout: Duration, journal: PayloadJournal) -> Self {
        Self {
            routes,
            timeout,
            journal,
        }
    }

    /// Sends `command` with its loose parameter bag. Always yields exactly one response.
    pub async fn send_command(&self, target: &str, command: &str, parameters: Map<String, Value>) -> ResponseMessage {
        let mut msg = ControlMessage::new(command, target);
        msg.parameters = parameters;
        self.dispatch(msg).await
    }

    pub async fn send(&self, target: &str, command: Command) -> ResponseMessage {
        self.dispatch(command.into_control(target)).await
    }

    async fn dispatch(&self, mut msg: ControlMessage) -> ResponseMessage {
        if let Some(id) = self.routes.configured_id(&msg.target_server_id) {
            msg.target_server_id = id.to_string();
        }
        match self.exchange(&msg).await {
            Ok(response) => {
                info!(
                    "{} -> {}: {} {}",
                    msg.command, msg.target_server_id, response.status, response.details
                );
                response
            }
            Err(e) => {
                warn!("{} -> {} failed: {}", msg.command, msg.target_server_id, e);
                e.into_response(msg.message_id)
            }
        }
    }

    async fn exchange(&self, msg: &ControlMessage) -> Result<ResponseMessage, BrokerError> {
        let station = msg.target_server_id.as_str();
        let addr = self.routes.socket_addr(station).await?;

        let payload = encode_control(msg).map_err(|source| BrokerError::Codec {
            station: station.to_string(),
            source,
        })?;
        let io_err = |source| BrokerError::Io {
            station: station.to_string(),
            source,
        };

        let local: SocketAddr = if addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await.map_err(io_err)?;
        socket.send_to(payload.as_bytes(), addr).await.map_err(io_err)?;
        self.journal
            .append(SENT_CONTROL_LOG, &format!("To {addr} (for station {station}) - {payload}"))
            .await;

        let deadline = Instant::now() + self.timeout;
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            let (len, from) = match timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Err(_) => return Err(BrokerError::Timeout(station.to_string())),
                Ok(Err(e)) => {
                    return Err(BrokerError::Unreachable {
                        station: station.to_string(),
                        reason: e.to_string(),
                    })
                }
                Ok(Ok(received)) => received,
            };
            let raw = String::from_utf8_lossy(&buf[..len]).into_owned();
            self.journal.append(RECEIVED_RESPONSE_LOG, &raw).await;

            match decode_response(&raw) {
                Ok(response) if correlates(&response, &msg.message_id) => return Ok(response),
                Ok(response) => warn!(
                    "discarding response from {} for {} (waiting for {})",
                    from, response.original_message_id, msg.message_id
                ),
                Err(e) => debug!("discarding undecodable datagram from {}: {}", from, e),
            }
        }
    }
}

/// A reply belongs to `sent_id`, or is a station's parse-failure answer,
/// which cannot name the message it failed to read.
fn correlates(response: &ResponseMessage, sent_id: &str) -> bool {
    response.original_message_id == sent_id
        || (response.status == ResponseStatus::ErrorParsing && response.original_message_id == UNKNOWN_MESSAGE_ID)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StationRoute;
    use std::collections::HashMap;

    fn sender(routes: &[(&str, u16)], timeout: Duration) -> CommandSender {
        let routes: HashMap<_, _> = routes
            .iter()
            .map(|(id, port)| (id.to_string(), StationRoute::new("127.0.0.1", *port)))
            .collect();
        CommandSender::new(RoutingTable::new(&routes), timeout, PayloadJournal::disabled())
    }

    #[test]
    fn test_correlation_rules() {
        let ok = ResponseMessage::new("abc", ResponseStatus::Ok, "");
        assert!(correlates(&ok, "abc"));
        assert!(!correlates(&ok, "xyz"));
        let parsing = ResponseMessage::new(UNKNOWN_MESSAGE_ID, ResponseStatus::ErrorParsing, "");
        assert!(correlates(&parsing, "xyz"));
        let na_ok = ResponseMessage::new(UNKNOWN_MESSAGE_ID, ResponseStatus::Ok, "");
        assert!(!correlates(&na_ok, "xyz"));
    }

    #[tokio::test]
    async fn test_unknown_station_fails_fast() {
        let sender = sender(&[("S1", 5001)], Duration::from_secs(5));
        let started = std::time::Instant::now();
        let response = sender.send("S9", Command::Stop).await;
        assert_eq!(response.status, ResponseStatus::Error);
        assert!(response.details.contains("S9"));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_silent_endpoint_times_out() {
        // bound but never read, so the datagram just sits there
        let silent = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = silent.local_addr().unwrap().port();
        let sender = sender(&[("S1", port)], Duration::from_millis(200));

        let msg_response = sender.send_command("s1", "SET_FREQUENCY", Map::new()).await;
        assert_eq!(msg_response.status, ResponseStatus::Timeout);
        assert_eq!(msg_response.details, "No response from server S1");
    }
}
