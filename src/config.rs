//! Gateway configuration

use std::net::{IpAddr, Ipv4Addr};

/// A camera address to register at startup
///
/// Without an explicit port the listening port is derived from the
/// address (see [`crate::registry::derive_port`]).
#[derive(Debug, Clone)]
pub struct CameraAddress {
    /// Service address or identifier string (typically an IPv4 address)
    pub address: String,

    /// Explicit listening port, for addresses discovered with a known port
    pub port: Option<u16>,
}

/// Gateway configuration options
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Local IP that endpoint sockets bind on
    pub bind_ip: IpAddr,

    /// Receive buffer size; datagrams longer than this are truncated
    pub recv_buffer_size: usize,

    /// Camera addresses registered when the dispatcher starts
    pub cameras: Vec<CameraAddress>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            recv_buffer_size: 4096,
            cameras: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Set the local bind IP
    pub fn bind(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Set the receive buffer size
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Add a camera whose port is derived from its address
    pub fn camera(mut self, address: impl Into<String>) -> Self {
        self.cameras.push(CameraAddress {
            address: address.into(),
            port: None,
        });
        self
    }

    /// Add a camera with an explicit listening port
    pub fn camera_with_port(mut self, address: impl Into<String>, port: u16) -> Self {
        self.cameras.push(CameraAddress {
            address: address.into(),
            port: Some(port),
        });
        self
    }
}
