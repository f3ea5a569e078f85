/*!
Loopback UDP stubs

Every stub binds a real socket on 127.0.0.1 with an OS-assigned port, so
tests exercise the actual datagram path and can still run in parallel.
*/

use anyhow::{Context, Result};
use meteo_protocol::{
    decode_control, decode_distribution, decode_response, encode_control, encode_response, ControlMessage,
    DistributionMessage, ResponseMessage, ResponseStatus, MAX_DATAGRAM_SIZE,
};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Loopback address for a port.
pub fn loopback(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

async fn bind_loopback() -> Result<UdpSocket> {
    UdpSocket::bind(loopback(0))
        .await
        .context("failed to bind loopback UDP socket")
}

async fn recv_text(socket: &UdpSocket, wait: Duration) -> Result<Option<(String, SocketAddr)>> {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    match timeout(wait, socket.recv_from(&mut buf)).await {
        Ok(Ok((len, from))) => Ok(Some((String::from_utf8_lossy(&buf[..len]).into_owned(), from))),
        Ok(Err(e)) => Err(e).context("UDP receive failed"),
        Err(_) => Ok(None),
    }
}

/// Sends one datagram from a throwaway socket.
pub async fn send_datagram(target: SocketAddr, payload: &str) -> Result<()> {
    let socket = bind_loopback().await?;
    socket
        .send_to(payload.as_bytes(), target)
        .await
        .with_context(|| format!("failed to send datagram to {target}"))?;
    Ok(())
}

/// Receives what a station broadcasts, in place of a broker.
pub struct BroadcastProbe {
    socket: UdpSocket,
    addr: SocketAddr,
}

impl BroadcastProbe {
    pub async fn bind() -> Result<Self> {
        let socket = bind_loopback().await?;
        let addr = socket.local_addr()?;
        Ok(Self { socket, addr })
    }

    /// Address to hand to a station as its broadcast target.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Next raw payload with its arrival time, `None` if nothing arrives in `wait`.
    pub async fn next_raw(&self, wait: Duration) -> Result<Option<(String, Instant)>> {
        Ok(recv_text(&self.socket, wait)
            .await?
            .map(|(raw, _)| (raw, Instant::now())))
    }

    /// Next broadcast decoded through the wire codec.
    pub async fn next_message(&self, wait: Duration) -> Result<Option<(DistributionMessage, Instant)>> {
        match self.next_raw(wait).await? {
            Some((raw, at)) => {
                let msg = decode_distribution(&raw).with_context(|| format!("undecodable broadcast: {raw}"))?;
                Ok(Some((msg, at)))
            }
            None => Ok(None),
        }
    }

    /// Discards datagrams until the socket stays quiet for `quiet`.
    pub async fn drain(&self, quiet: Duration) -> Result<usize> {
        let mut dropped = 0;
        while self.next_raw(quiet).await?.is_some() {
            dropped += 1;
        }
        if dropped > 0 {
            log::debug!("probe drained {} stale broadcasts", dropped);
        }
        Ok(dropped)
    }
}

/// Sends control datagrams and reads the replies, in place of a broker.
pub struct ControlClient {
    socket: UdpSocket,
}

impl ControlClient {
    pub async fn bind() -> Result<Self> {
        Ok(Self {
            socket: bind_loopback().await?,
        })
    }

    pub async fn send(&self, target: SocketAddr, msg: &ControlMessage) -> Result<()> {
        let payload = encode_control(msg)?;
        self.send_raw(target, &payload).await
    }

    pub async fn send_raw(&self, target: SocketAddr, payload: &str) -> Result<()> {
        self.socket
            .send_to(payload.as_bytes(), target)
            .await
            .with_context(|| format!("failed to send control datagram to {target}"))?;
        log::info!("📤 control -> {}: {}", target, payload);
        Ok(())
    }

    pub async fn next_response(&self, wait: Duration) -> Result<Option<ResponseMessage>> {
        match recv_text(&self.socket, wait).await? {
            Some((raw, _)) => Ok(Some(
                decode_response(&raw).with_context(|| format!("undecodable response: {raw}"))?,
            )),
            None => Ok(None),
        }
    }

    /// Sends `msg` and waits for one reply.
    pub async fn request(&self, target: SocketAddr, msg: &ControlMessage, wait: Duration) -> Result<ResponseMessage> {
        self.send(target, msg).await?;
        self.next_response(wait)
            .await?
            .with_context(|| format!("no response to {} within {:?}", msg.command, wait))
    }
}

/// How a [`FakeStation`] answers each control datagram.
#[derive(Debug, Clone)]
pub enum FakeReply {
    /// Correlated reply with this status and details.
    Respond(ResponseStatus, String),
    Silent,
    /// Reply pointing at some other message id.
    Uncorrelated,
    /// An unrelated reply first, then the correlated one.
    UncorrelatedThenRespond(ResponseStatus, String),
    /// Payload sent back verbatim.
    Raw(String),
}

/// Control endpoint answering with scripted replies.
pub struct FakeStation {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<ControlMessage>>>,
    task: JoinHandle<()>,
}

impl FakeStation {
    pub async fn spawn(reply: FakeReply) -> Result<Self> {
        let socket = bind_loopback().await?;
        let addr = socket.local_addr()?;
        let received = Arc::new(Mutex::new(Vec::new()));
        let record = received.clone();

        let task = tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
            loop {
                let (len, peer) = match socket.recv_from(&mut buf).await {
                    Ok(r) => r,
                    Err(e) => {
                        log::warn!("fake station receive failed: {}", e);
                        continue;
                    }
                };
                let raw = String::from_utf8_lossy(&buf[..len]).into_owned();
                let msg = match decode_control(&raw) {
                    Ok(msg) => msg,
                    Err(e) => {
                        log::warn!("fake station got undecodable control: {}", e);
                        if let FakeReply::Raw(payload) = &reply {
                            let _ = socket.send_to(payload.as_bytes(), peer).await;
                        }
                        continue;
                    }
                };
                if let Ok(mut seen) = record.lock() {
                    seen.push(msg.clone());
                }

                for payload in replies_for(&reply, &msg) {
                    if let Err(e) = socket.send_to(payload.as_bytes(), peer).await {
                        log::warn!("fake station reply failed: {}", e);
                    }
                }
            }
        });

        log::info!("🛰️ fake station listening on {}", addr);
        Ok(Self { addr, received, task })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Control messages received so far, in arrival order.
    pub fn received(&self) -> Vec<ControlMessage> {
        self.received.lock().map(|seen| seen.clone()).unwrap_or_default()
    }
}

impl Drop for FakeStation {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn replies_for(reply: &FakeReply, msg: &ControlMessage) -> Vec<String> {
    let correlated = |status: ResponseStatus, details: &str| {
        encode_response(&ResponseMessage::new(msg.message_id.clone(), status, details))
    };
    let unrelated = || encode_response(&ResponseMessage::new("some-other-request", ResponseStatus::Ok, "stale"));

    let encoded = match reply {
        FakeReply::Respond(status, details) => vec![correlated(*status, details)],
        FakeReply::Silent => Vec::new(),
        FakeReply::Uncorrelated => vec![unrelated()],
        FakeReply::UncorrelatedThenRespond(status, details) => vec![unrelated(), correlated(*status, details)],
        FakeReply::Raw(payload) => return vec![payload.clone()],
    };
    encoded.into_iter().filter_map(Result::ok).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_station_correlates_replies() {
        let station = FakeStation::spawn(FakeReply::Respond(ResponseStatus::Ok, "fine".into()))
            .await
            .unwrap();
        let client = ControlClient::bind().await.unwrap();
        let msg = ControlMessage::new("TOGGLE_SENDING_DATA", "S1").with_parameter("active", true);

        let response = client
            .request(station.addr(), &msg, Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(response.original_message_id, msg.message_id);
        assert_eq!(response.details, "fine");
        assert_eq!(station.received().len(), 1);
    }

    #[tokio::test]
    async fn test_silent_station_yields_nothing() {
        let station = FakeStation::spawn(FakeReply::Silent).await.unwrap();
        let client = ControlClient::bind().await.unwrap();
        client
            .send(station.addr(), &ControlMessage::new("STOP_SERVER_PROCESS", "S1"))
            .await
            .unwrap();
        assert!(client
            .next_response(Duration::from_millis(200))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_probe_receives_datagrams_in_order() {
        let probe = BroadcastProbe::bind().await.unwrap();
        send_datagram(probe.addr(), "first").await.unwrap();
        send_datagram(probe.addr(), "second").await.unwrap();

        let (first, _) = probe.next_raw(Duration::from_secs(1)).await.unwrap().unwrap();
        let (second, _) = probe.next_raw(Duration::from_secs(1)).await.unwrap().unwrap();
        assert_eq!((first.as_str(), second.as_str()), ("first", "second"));
        assert_eq!(probe.drain(Duration::from_millis(50)).await.unwrap(), 0);
    }
}
