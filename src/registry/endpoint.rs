//! Endpoint type

use std::os::unix::io::RawFd;

/// One registered virtual camera service instance, reachable through
/// exactly one socket
#[derive(Debug)]
pub struct Endpoint {
    address: String,
    fd: RawFd,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, fd: RawFd) -> Self {
        Self {
            address: address.into(),
            fd,
        }
    }

    /// Service address or identifier string
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Owning socket descriptor
    pub fn fd(&self) -> RawFd {
        self.fd
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (fd {})", self.address, self.fd)
    }
}
