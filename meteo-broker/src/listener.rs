/**
 * BROADCAST LISTENER - ingestion of station broadcasts
 *
 * ROLE :
 * Receives every distribution envelope on the broadcast port and keeps the
 * latest one per station in the shared table.
 *
 * OPERATION :
 * - Bounded idle timeout on each receive so the shutdown flag is observed
 *   even when no station is talking
 * - A bad packet is logged and dropped; it never touches other entries and
 *   never ends the loop
 */

use crate::state::LatestReadings;
use meteo_protocol::{decode_distribution, CodecError, PayloadJournal};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const RECEIVED_BROADCAST_LOG: &str = "broker_received_broadcast.log";

/// Pause after a failed receive so a persistent socket error cannot spin.
const RECEIVE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Decodes one envelope and stores it. Returns the station id on success.
pub fn ingest(latest: &LatestReadings, raw: &str) -> Result<String, CodecError> {
    let msg = decode_distribution(raw)?;
    let server_id = msg.server_id.clone();
    latest.update(msg);
    Ok(server_id)
}

pub struct BroadcastListener {
    socket: UdpSocket,
    latest: LatestReadings,
    idle_timeout: Duration,
    buffer_size: usize,
    journal: PayloadJournal,
    shutdown: Arc<AtomicBool>,
}

impl BroadcastListener {
    pub async fn bind(port: u16, latest: LatestReadings, shutdown: Arc<AtomicBool>) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await?;
        Ok(Self {
            socket,
            latest,
            idle_timeout: Duration::from_secs(5),
            buffer_size: meteo_protocol::MAX_DATAGRAM_SIZE,
            journal: PayloadJournal::disabled(),
            shutdown,
        })
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_journal(mut self, journal: PayloadJournal) -> Self {
        self.journal = journal;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub async fn run(self) {
        let mut buf = vec![0u8; self.buffer_size];
        info!("listening for broadcasts on {:?}", self.socket.local_addr().ok());

        while !self.shutdown.load(Ordering::Relaxed) {
            let (len, from) = match timeout(self.idle_timeout, self.socket.recv_from(&mut buf)).await {
                Err(_) => {
                    debug!("no broadcast within {:?}", self.idle_timeout);
                    continue;
                }
                Ok(Err(e)) => {
                    warn!("broadcast receive failed: {}", e);
                    tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
                    continue;
                }
                Ok(Ok(received)) => received,
            };

            let raw = String::from_utf8_lossy(&buf[..len]).into_owned();
            self.journal.append(RECEIVED_BROADCAST_LOG, &raw).await;
            match ingest(&self.latest, &raw) {
                Ok(server_id) => debug!("reading from {} ({})", server_id, from),
                Err(e) => warn!("dropping broadcast from {}: {}", from, e),
            }
        }

        info!("broadcast listener stopped");
    }
}
