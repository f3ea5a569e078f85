//! Control listener
//!
//! Serves control datagrams one at a time, in arrival order. After a stop
//! command the socket stays open for [`STOP_GRACE`] so the final response
//! leaves the host before the socket is dropped.

use crate::handler;
use crate::state::SharedState;
use meteo_protocol::{encode_response, PayloadJournal, MAX_DATAGRAM_SIZE};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{error, info, warn};

pub const STOP_GRACE: Duration = Duration::from_millis(500);

/// Pause after a failed receive so a persistent socket error cannot spin.
const RECEIVE_RETRY_DELAY: Duration = Duration::from_millis(100);

pub struct ControlListener {
    state: SharedState,
    socket: UdpSocket,
    journal: PayloadJournal,
    journal_file: String,
}

impl ControlListener {
    pub fn new(state: SharedState, socket: UdpSocket, journal: PayloadJournal) -> Self {
        let journal_file = format!("station_{}_received_control.log", state.server_id);
        Self {
            state,
            socket,
            journal,
            journal_file,
        }
    }

    pub async fn run(self) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    warn!("control receive failed: {}", e);
                    tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
                    continue;
                }
            };
            let raw = String::from_utf8_lossy(&buf[..len]).into_owned();
            self.journal
                .append(&self.journal_file, &format!("From {peer} - {raw}"))
                .await;

            let Some(reply) = handler::handle_datagram(&self.state, &raw) else {
                continue;
            };

            match encode_response(&reply.response) {
                Ok(payload) => {
                    if let Err(e) = self.socket.send_to(payload.as_bytes(), peer).await {
                        warn!("response to {} failed: {}", peer, e);
                    }
                }
                Err(e) => error!("failed to encode response: {}", e),
            }

            if reply.stop {
                tokio::time::sleep(STOP_GRACE).await;
                break;
            }
        }

        info!("control listener closed");
    }
}
