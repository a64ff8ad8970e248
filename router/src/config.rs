//! Router configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Path of the deployment endpoint; everything else is forwarded
pub const VERSION_UPDATE_PATH: &str = "/__meta__/version";

/// How long a forwarded request waits for a live generation
pub const LIVE_PORT_TIMEOUT: Duration = Duration::from_secs(5);
/// Timeout applied to each forwarded backend call
pub const PROXY_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_LISTEN_PORT: u16 = 5152;
/// Edge and cluster layers reach the router over the network
pub const DEFAULT_LISTEN_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub bind_address: SocketAddr,
    pub live_port_timeout: Duration,
    pub proxy_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::new(DEFAULT_LISTEN_ADDR, DEFAULT_LISTEN_PORT),
            live_port_timeout: LIVE_PORT_TIMEOUT,
            proxy_timeout: PROXY_TIMEOUT,
        }
    }
}

impl RouterConfig {
    pub fn with_bind_address(mut self, bind_address: SocketAddr) -> Self {
        self.bind_address = bind_address;
        self
    }

    pub fn with_live_port_timeout(mut self, timeout: Duration) -> Self {
        self.live_port_timeout = timeout;
        self
    }

    pub fn with_proxy_timeout(mut self, timeout: Duration) -> Self {
        self.proxy_timeout = timeout;
        self
    }
}
