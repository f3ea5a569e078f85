//! Static routing table: logical station id -> control endpoint.
//!
//! Ids are matched case-insensitively but keep the spelling they were
//! configured with, which is what goes on the wire. Host names are resolved
//! on every send, so a station moving to another address only needs DNS.

use crate::config::StationRoute;
use crate::error::BrokerError;
use std::collections::HashMap;
use std::net::SocketAddr;

#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    /// normalized id -> (configured id, route)
    routes: HashMap<String, (String, StationRoute)>,
}

fn normalize(id: &str) -> String {
    id.trim().to_ascii_uppercase()
}

impl RoutingTable {
    pub fn new(routes: &HashMap<String, StationRoute>) -> Self {
        Self {
            routes: routes
                .iter()
                .map(|(id, route)| (normalize(id), (id.trim().to_string(), route.clone())))
                .collect(),
        }
    }

    pub fn resolve(&self, station_id: &str) -> Option<&StationRoute> {
        self.routes.get(&normalize(station_id)).map(|(_, route)| route)
    }

    /// The id as written in the config, whatever case `station_id` uses.
    pub fn configured_id(&self, station_id: &str) -> Option<&str> {
        self.routes.get(&normalize(station_id)).map(|(id, _)| id.as_str())
    }

    /// Known ids as configured, sorted.
    pub fn station_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.routes.values().map(|(id, _)| id.clone()).collect();
        ids.sort();
        ids
    }

    /// Socket address for `station_id`, IPv4 preferred.
    pub async fn socket_addr(&self, station_id: &str) -> Result<SocketAddr, BrokerError> {
        let route = self
            .resolve(station_id)
            .ok_or_else(|| BrokerError::RoutingFailure(station_id.to_string()))?;

        let unreachable = |reason: String| BrokerError::Unreachable {
            station: station_id.to_string(),
            reason,
        };
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((route.host.as_str(), route.port))
            .await
            .map_err(|e| unreachable(format!("cannot resolve {}: {e}", route.host)))?
            .collect();

        addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| unreachable(format!("no address for {}", route.host)))
    }
}
