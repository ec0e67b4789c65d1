use libp2p::Multiaddr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// Default port for network connections (0 picks a free one)
pub const DEFAULT_PORT: u16 = 0;

/// Network configuration struct
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Port to bind to
    pub port: u16,

    /// Discover peers on the local network
    pub enable_mdns: bool,

    /// Seconds an unused connection is kept open
    pub idle_timeout_secs: u64,

    /// Addresses to try for a username, as multiaddr strings
    pub known_peers: BTreeMap<String, Vec<String>>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            enable_mdns: true,
            idle_timeout_secs: 60,
            known_peers: BTreeMap::new(),
        }
    }
}

impl NetworkConfig {
    pub fn listen_multiaddr(&self) -> Multiaddr {
        let mut addr = Multiaddr::empty();
        addr.push(libp2p::multiaddr::Protocol::Ip4(Ipv4Addr::UNSPECIFIED));
        addr.push(libp2p::multiaddr::Protocol::Tcp(self.port));
        addr
    }

    /// Parsed addresses for `username`; unparsable entries are skipped
    pub fn addresses_for(&self, username: &str) -> Vec<Multiaddr> {
        self.known_peers
            .get(username)
            .map(|addrs| addrs.iter().filter_map(|a| a.parse().ok()).collect())
            .unwrap_or_default()
    }

    /// Every configured address that fails to parse
    pub fn invalid_addresses(&self) -> Vec<String> {
        self.known_peers
            .values()
            .flatten()
            .filter(|a| a.parse::<Multiaddr>().is_err())
            .cloned()
            .collect()
    }
}
