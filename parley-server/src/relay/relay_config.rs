use parley_core::utils::DEFAULT_RELAY_PORT;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Relay listen settings. No auth and no TLS: the relay is a plain `ws://` endpoint.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// `None` turns the relay into an unbounded broadcast domain.
    pub max_peers: Option<usize>,
}

impl RelayConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_RELAY_PORT,
            max_peers: Some(2),
        }
    }
}
