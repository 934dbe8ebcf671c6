//! Address registry
//!
//! Owns the descriptor-to-endpoint map and the used-port table. Adding an
//! address derives (or accepts) a listening port, binds the UDP socket,
//! and records the endpoint under the socket's descriptor; the bound
//! socket is handed back to the caller for tracking in the dispatch loop.

use std::net::{IpAddr, SocketAddr};
use std::os::unix::io::{AsRawFd, RawFd};

use tokio::net::UdpSocket;

use crate::error::{Error, Result};

use super::avl::AvlTree;
use super::endpoint::Endpoint;
use super::ports::{derive_port, PortTable};

/// Registry of virtual camera endpoints keyed by socket descriptor
pub struct AddressRegistry {
    bind_ip: IpAddr,
    map: AvlTree<Endpoint>,
    ports: PortTable,
}

impl AddressRegistry {
    pub fn new(bind_ip: IpAddr) -> Self {
        Self {
            bind_ip,
            map: AvlTree::new(),
            ports: PortTable::new(),
        }
    }

    /// Register `address` on its derived port
    ///
    /// Returns the newly bound socket, or `None` when the port is already
    /// claimed or unusable: a silent no-op, nothing is registered.
    pub async fn add(&mut self, address: &str) -> Result<Option<UdpSocket>> {
        let port = derive_port(address);
        tracing::debug!(address, port, "derived listening port");
        self.add_with_port(port, address).await
    }

    /// Register `address` on an explicit port, for addresses discovered
    /// with a known port
    pub async fn add_with_port(&mut self, port: u32, address: &str) -> Result<Option<UdpSocket>> {
        if !PortTable::in_range(port) {
            tracing::warn!(address, port, "port outside usable range, endpoint not registered");
            return Ok(None);
        }

        let port = port as u16;
        if self.ports.is_taken(port) {
            tracing::debug!(address, port, "port already claimed, endpoint not registered");
            return Ok(None);
        }
        self.ports.mark(port);

        let socket = UdpSocket::bind(SocketAddr::new(self.bind_ip, port))
            .await
            .map_err(|source| Error::Bind { port, source })?;
        let fd = socket.as_raw_fd();

        tracing::info!(fd, port, address, "endpoint registered");

        if self.map.insert(fd, Endpoint::new(address, fd)).is_some() {
            tracing::warn!(fd, "descriptor already present in registry, endpoint replaced");
        }

        Ok(Some(socket))
    }

    /// Resolve a tracked descriptor to its endpoint
    ///
    /// The dispatcher's tracked set and the registry's key set always
    /// agree; a miss is an invariant breach and terminates the process.
    pub fn lookup(&self, fd: RawFd) -> &Endpoint {
        match self.map.get(fd) {
            Some(endpoint) => endpoint,
            None => {
                tracing::error!(fd, "tracked descriptor missing from the address registry");
                panic!("descriptor {fd} missing from address registry");
            }
        }
    }

    /// Reverse lookup: first endpoint whose address contains `needle`, in
    /// left-subtree, right-subtree, node traversal order
    pub fn find_matching_address(&self, needle: &str) -> Option<&Endpoint> {
        self.map
            .find_postorder(|endpoint| endpoint.address().contains(needle))
    }

    /// Drop the endpoint registered under `fd`
    ///
    /// Used by the dispatcher's close path. The port bit stays set: ports
    /// are never returned to the pool.
    pub fn remove(&mut self, fd: RawFd) -> Option<Endpoint> {
        self.map.remove(fd)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use tokio_test::assert_ok;

    use super::*;

    fn localhost_registry() -> AddressRegistry {
        AddressRegistry::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    #[tokio::test]
    async fn test_add_binds_derived_port() {
        let mut registry = localhost_registry();

        let socket = assert_ok!(registry.add("192.168.31.45").await)
            .expect("port 3145 should be claimable");

        assert_eq!(socket.local_addr().unwrap().port(), 3145);
        assert_eq!(registry.len(), 1);

        let endpoint = registry.lookup(socket.as_raw_fd());
        assert_eq!(endpoint.address(), "192.168.31.45");
        assert_eq!(endpoint.fd(), socket.as_raw_fd());
    }

    #[tokio::test]
    async fn test_add_same_port_is_noop() {
        let mut registry = localhost_registry();

        // Both addresses derive port 1077.
        let first = registry.add("192.168.1.77").await.unwrap();
        assert!(first.is_some());
        assert_eq!(registry.len(), 1);

        let second = registry.add("10.0.10.77").await.unwrap();
        assert!(second.is_none());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_add_out_of_range_port_is_noop() {
        let mut registry = localhost_registry();

        // "10.0.0.200" derives port 200, below the usable range.
        let socket = registry.add("10.0.0.200").await.unwrap();
        assert!(socket.is_none());
        assert!(registry.is_empty());

        let socket = registry.add_with_port(40000, "10.0.0.201").await.unwrap();
        assert!(socket.is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_find_matching_address() {
        let mut registry = localhost_registry();

        assert!(registry.find_matching_address("10.").is_none());

        let _a = registry.add_with_port(18101, "192.168.7.31").await.unwrap();
        let _b = registry.add_with_port(18102, "10.20.30.40").await.unwrap();

        let found = registry.find_matching_address("10.20").unwrap();
        assert_eq!(found.address(), "10.20.30.40");

        assert!(registry.find_matching_address("172.16").is_none());
    }

    #[tokio::test]
    async fn test_remove_keeps_port_claimed() {
        let mut registry = localhost_registry();

        let socket = registry
            .add_with_port(18103, "192.168.7.32")
            .await
            .unwrap()
            .unwrap();
        let fd = socket.as_raw_fd();
        drop(socket);

        let endpoint = registry.remove(fd).expect("endpoint should be present");
        assert_eq!(endpoint.address(), "192.168.7.32");
        assert!(registry.is_empty());

        // The port is not returned to the pool.
        let again = registry.add_with_port(18103, "192.168.7.33").await.unwrap();
        assert!(again.is_none());
    }

    #[test]
    #[should_panic(expected = "missing from address registry")]
    fn test_lookup_miss_is_fatal() {
        let registry = localhost_registry();
        registry.lookup(42);
    }
}
