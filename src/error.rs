//! Gateway error types
//!
//! Only genuinely fatal conditions surface as errors: socket setup failures
//! and send/receive failures outside the would-block path. Malformed
//! datagrams are not errors; the protocol engine reports those as a
//! dropped outcome and the gateway keeps running.

use std::os::unix::io::RawFd;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for gateway operations
#[derive(Debug)]
pub enum Error {
    /// Creating or binding an endpoint socket failed
    Bind {
        port: u16,
        source: std::io::Error,
    },
    /// A send or receive on a tracked descriptor failed for a reason
    /// other than would-block
    Socket {
        fd: RawFd,
        source: std::io::Error,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Bind { port, source } => {
                write!(f, "failed to bind UDP socket on port {}: {}", port, source)
            }
            Error::Socket { fd, source } => {
                write!(f, "socket operation failed on fd {}: {}", fd, source)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Bind { source, .. } | Error::Socket { source, .. } => Some(source),
        }
    }
}
