//! Periodic broadcast of readings
//!
//! One tick per period while the station is running and sending. A change of
//! period replaces the ticker, so the new period starts right away instead of
//! after the old one elapses. A slow tick delays the next one, never doubles it.

use crate::readings;
use crate::state::SharedState;
use meteo_protocol::{encode_distribution, DistributionMessage, PayloadJournal};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

pub struct Broadcaster {
    state: SharedState,
    socket: UdpSocket,
    target: SocketAddr,
    journal: PayloadJournal,
    journal_file: String,
}

fn ticker(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

impl Broadcaster {
    pub fn new(state: SharedState, socket: UdpSocket, target: SocketAddr, journal: PayloadJournal) -> Self {
        let journal_file = format!("station_{}_sent_broadcast.log", state.server_id);
        Self {
            state,
            socket,
            target,
            journal,
            journal_file,
        }
    }

    pub async fn run(self) {
        let mut settings = self.state.subscribe();
        let mut rng = StdRng::from_entropy();
        let mut period = settings.borrow_and_update().frequency;
        let mut ticks = ticker(period);

        info!("broadcasting to {} every {:?}", self.target, period);

        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    let snapshot = settings.borrow().clone();
                    if !snapshot.running {
                        break;
                    }
                    if snapshot.sending {
                        let variables = readings::sample(&mut rng, &snapshot.variables);
                        let msg = DistributionMessage::new(&self.state.server_id, snapshot.encoding, variables);
                        self.send(&msg).await;
                    }
                }
                changed = settings.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = settings.borrow_and_update().clone();
                    if !snapshot.running {
                        break;
                    }
                    if snapshot.frequency != period {
                        period = snapshot.frequency;
                        ticks = ticker(period);
                        info!("broadcast period now {:?}", period);
                    }
                }
            }
        }

        info!("broadcaster stopped");
    }

    async fn send(&self, msg: &DistributionMessage) {
        let raw = match encode_distribution(msg) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("failed to encode broadcast: {}", e);
                return;
            }
        };
        match self.socket.send_to(raw.as_bytes(), self.target).await {
            Ok(_) => debug!("broadcast {} ({} bytes)", msg.message_id, raw.len()),
            Err(e) => warn!("broadcast to {} failed: {}", self.target, e),
        }
        self.journal.append(&self.journal_file, &raw).await;
    }
}
