/*!
 * METEONET BROKER - aggregation and command relay
 *
 * ROLE : collects station broadcasts into a latest-reading table and relays
 * control commands to stations on behalf of adapters (console today).
 *
 * ARCHITECTURE : one broadcast listener task + one short-lived exchange per
 * command. Adapters only see the StationGateway interface.
 */

pub mod config;
pub mod console;
pub mod error;
pub mod listener;
pub mod routing;
pub mod sender;
pub mod state;

pub use config::{BrokerConfig, StationRoute};
pub use error::BrokerError;
pub use state::LatestReadings;

use listener::BroadcastListener;
use meteo_protocol::{Command, DistributionMessage, PayloadJournal, ResponseMessage};
use routing::RoutingTable;
use sender::CommandSender;
use serde_json::{Map, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// What adapters (console, REST, mail...) may do with a broker.
pub trait StationGateway {
    /// Latest reading of every station heard so far.
    fn latest_data(&self) -> Vec<DistributionMessage>;

    /// Sends one command and yields its terminal response.
    fn send_command(
        &self,
        target: &str,
        command: &str,
        parameters: Map<String, Value>,
    ) -> impl Future<Output = ResponseMessage> + Send;
}

pub struct Broker {
    latest: LatestReadings,
    sender: CommandSender,
    broadcast_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    listener: Option<JoinHandle<()>>,
}

impl Broker {
    /// Binds the broadcast port and starts ingesting.
    pub async fn start(config: BrokerConfig) -> std::io::Result<Self> {
        let latest = LatestReadings::new();
        let shutdown = Arc::new(AtomicBool::new(false));
        let journal = PayloadJournal::from_option(config.journal_dir.clone());

        let listener = BroadcastListener::bind(config.broadcast_port, latest.clone(), shutdown.clone())
            .await?
            .with_idle_timeout(config.receive_timeout())
            .with_buffer_size(config.receive_buffer_bytes)
            .with_journal(journal.clone());
        let broadcast_addr = listener.local_addr()?;
        let listener = tokio::spawn(listener.run());

        let routes = RoutingTable::new(&config.stations);
        info!(
            "broker up: broadcasts on {}, routes to {:?}",
            broadcast_addr,
            routes.station_ids()
        );
        let sender = CommandSender::new(routes, config.command_timeout(), journal);

        Ok(Self {
            latest,
            sender,
            broadcast_addr,
            shutdown,
            listener: Some(listener),
        })
    }

    pub fn broadcast_addr(&self) -> SocketAddr {
        self.broadcast_addr
    }

    pub fn latest(&self, server_id: &str) -> Option<DistributionMessage> {
        self.latest.get(server_id)
    }

    /// Typed variant of [`StationGateway::send_command`].
    pub async fn send(&self, target: &str, command: Command) -> ResponseMessage {
        self.sender.send(target, command).await
    }

    /// Asks the listener to stop; it notices within one idle timeout.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub async fn join(&mut self) {
        if let Some(listener) = self.listener.take() {
            let _ = listener.await;
        }
    }
}

impl StationGateway for Broker {
    fn latest_data(&self) -> Vec<DistributionMessage> {
        self.latest.snapshot()
    }

    async fn send_command(&self, target: &str, command: &str, parameters: Map<String, Value>) -> ResponseMessage {
        self.sender.send_command(target, command, parameters).await
    }
}
