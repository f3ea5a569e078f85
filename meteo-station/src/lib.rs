//! Meteonet Station - simulated weather station
//!
//! A station runs two tasks against one shared settings snapshot:
//! - Broadcaster: periodic UDP broadcast of fresh readings (JSON or XML envelope)
//! - Control listener: applies remote commands and answers each one
//!
//! Both stop after a `STOP_SERVER_PROCESS` command.

pub mod broadcaster;
pub mod config;
pub mod error;
pub mod handler;
pub mod listener;
pub mod readings;
pub mod state;

pub use config::StationConfig;
pub use error::StationError;
pub use state::{StationSettings, StationState};

use broadcaster::Broadcaster;
use listener::ControlListener;
use meteo_protocol::PayloadJournal;
use state::SharedState;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::info;

/// Running station.
pub struct StationHandle {
    state: SharedState,
    control_addr: SocketAddr,
    broadcaster: JoinHandle<()>,
    listener: JoinHandle<()>,
}

impl StationHandle {
    pub fn server_id(&self) -> &str {
        &self.state.server_id
    }

    /// Local address of the control socket (unspecified IP, actual port).
    pub fn control_addr(&self) -> SocketAddr {
        self.control_addr
    }

    pub fn control_port(&self) -> u16 {
        self.control_addr.port()
    }

    pub fn settings(&self) -> StationSettings {
        self.state.snapshot()
    }

    /// Resolves once both tasks have finished, i.e. after a stop command.
    pub async fn wait(&mut self) {
        let _ = (&mut self.listener).await;
        let _ = (&mut self.broadcaster).await;
    }

    pub fn abort(&self) {
        self.listener.abort();
        self.broadcaster.abort();
    }
}

/// Binds both sockets and spawns the station tasks.
pub async fn start(config: StationConfig) -> Result<StationHandle, StationError> {
    let control_socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.control_port))).await?;
    let control_addr = control_socket.local_addr()?;

    let broadcast_socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))).await?;
    broadcast_socket.set_broadcast(true)?;

    let state = StationState::new(config.server_id.clone(), StationSettings::initial(&config));
    let journal = PayloadJournal::from_option(config.journal_dir.clone());

    let broadcaster = tokio::spawn(
        Broadcaster::new(state.clone(), broadcast_socket, config.broadcast_target, journal.clone()).run(),
    );
    let listener = tokio::spawn(ControlListener::new(state.clone(), control_socket, journal).run());

    info!(
        "station {} up: control on {}, {} variables",
        config.server_id,
        control_addr,
        config.variables.len()
    );

    Ok(StationHandle {
        state,
        control_addr,
        broadcaster,
        listener,
    })
}
