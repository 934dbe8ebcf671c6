//! Dispatch loop
//!
//! A single task owns every tracked descriptor, the address registry, the
//! protocol engine and the actuator, so none of them need locking. The
//! loop parks on one readiness poll across all tracked descriptors; when
//! a UDP socket turns ready it is drained with nonblocking receives until
//! would-block, so every datagram the kernel has queued is handled before
//! the loop parks again. Replies go back to the peer address captured by
//! the receive.

use std::collections::HashMap;
use std::future::poll_fn;
use std::io;
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};
use std::task::Poll;

use tokio::io::ReadBuf;
use tokio::net::{TcpListener, UdpSocket};

use crate::actuator::Actuator;
use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::protocol::{Engine, Outcome};
use crate::registry::AddressRegistry;

/// Tracked descriptor type tag
///
/// `Tcp` is reserved for a future stream data path; nothing creates one
/// today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Udp,
    TcpListen,
    Tcp,
}

enum TrackedIo {
    Udp(UdpSocket),
    TcpListen(TcpListener),
}

struct Tracked {
    io: TrackedIo,
    hangup: bool,
}

impl Tracked {
    fn kind(&self) -> SocketKind {
        match self.io {
            TrackedIo::Udp(_) => SocketKind::Udp,
            TrackedIo::TcpListen(_) => SocketKind::TcpListen,
        }
    }
}

enum Event {
    /// First datagram of a drain pass, already read into the receive buffer
    Datagram {
        fd: RawFd,
        len: usize,
        peer: SocketAddr,
    },
    /// Inbound connection on a reserved listening descriptor
    TcpAccept { fd: RawFd, peer: SocketAddr },
}

/// Single-task readiness-driven multiplexer over all endpoint sockets
pub struct Dispatcher {
    config: GatewayConfig,
    registry: AddressRegistry,
    tracked: HashMap<RawFd, Tracked>,
    engine: Engine,
    actuator: Box<dyn Actuator>,
    recv_buf: Vec<u8>,
}

impl Dispatcher {
    pub fn new(config: GatewayConfig, actuator: Box<dyn Actuator>) -> Self {
        let registry = AddressRegistry::new(config.bind_ip);
        let recv_buf = vec![0u8; config.recv_buffer_size];

        Self {
            config,
            registry,
            tracked: HashMap::new(),
            engine: Engine::new(),
            actuator,
            recv_buf,
        }
    }

    pub fn registry(&self) -> &AddressRegistry {
        &self.registry
    }

    /// Register a camera address on its derived port and start serving it
    ///
    /// Returns `false` when the port was already claimed or unusable.
    pub async fn add_address(&mut self, address: &str) -> Result<bool> {
        let socket = self.registry.add(address).await?;
        Ok(self.track_udp(socket))
    }

    /// Register a camera address on an explicit port
    pub async fn add_address_with_port(&mut self, port: u32, address: &str) -> Result<bool> {
        let socket = self.registry.add_with_port(port, address).await?;
        Ok(self.track_udp(socket))
    }

    /// Register every camera named in the configuration
    pub async fn register_cameras(&mut self) -> Result<()> {
        let cameras = self.config.cameras.clone();
        for camera in cameras {
            match camera.port {
                Some(port) => self.add_address_with_port(port as u32, &camera.address).await?,
                None => self.add_address(&camera.address).await?,
            };
        }
        Ok(())
    }

    /// Track a listening socket on the reserved TCP extension point
    ///
    /// Ready connections are accepted and immediately dropped; the stream
    /// data path is not implemented.
    pub fn track_tcp_listener(&mut self, listener: TcpListener) {
        let fd = listener.as_raw_fd();
        tracing::info!(fd, "tracking tcp listener");
        self.tracked.insert(
            fd,
            Tracked {
                io: TrackedIo::TcpListen(listener),
                hangup: false,
            },
        );
    }

    fn track_udp(&mut self, socket: Option<UdpSocket>) -> bool {
        match socket {
            Some(socket) => {
                let fd = socket.as_raw_fd();
                self.tracked.insert(
                    fd,
                    Tracked {
                        io: TrackedIo::Udp(socket),
                        hangup: false,
                    },
                );
                true
            }
            None => false,
        }
    }

    /// Run the dispatch loop
    ///
    /// Parks until a tracked descriptor turns ready; there is no timeout,
    /// so liveness depends entirely on network activity. Returns only on
    /// a fatal socket error.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            match self.next_event().await? {
                Event::Datagram { fd, len, peer } => {
                    self.handle_datagram(fd, len, peer)?;
                    self.drain_udp(fd)?;
                    self.close_if_hangup(fd);
                }
                Event::TcpAccept { fd, peer } => {
                    tracing::debug!(fd, peer = %peer, "tcp data path not enabled, connection dropped");
                }
            }
        }
    }

    /// Park until some tracked descriptor produces work
    ///
    /// For UDP descriptors the readiness poll also pulls the first
    /// datagram into the receive buffer; the rest of the queue is drained
    /// by the caller.
    async fn next_event(&mut self) -> Result<Event> {
        poll_fn(|cx| {
            let this = &mut *self;

            for (&fd, tracked) in this.tracked.iter() {
                match &tracked.io {
                    TrackedIo::Udp(socket) => {
                        let mut buf = ReadBuf::new(&mut this.recv_buf);
                        match socket.poll_recv_from(cx, &mut buf) {
                            Poll::Ready(Ok(peer)) => {
                                return Poll::Ready(Ok(Event::Datagram {
                                    fd,
                                    len: buf.filled().len(),
                                    peer,
                                }));
                            }
                            Poll::Ready(Err(source)) => {
                                return Poll::Ready(Err(Error::Socket { fd, source }));
                            }
                            Poll::Pending => {}
                        }
                    }
                    TrackedIo::TcpListen(listener) => match listener.poll_accept(cx) {
                        Poll::Ready(Ok((_stream, peer))) => {
                            return Poll::Ready(Ok(Event::TcpAccept { fd, peer }));
                        }
                        Poll::Ready(Err(source)) => {
                            return Poll::Ready(Err(Error::Socket { fd, source }));
                        }
                        Poll::Pending => {}
                    },
                }
            }

            Poll::Pending
        })
        .await
    }

    /// Decode and dispatch one received datagram, sending any staged reply
    fn handle_datagram(&mut self, fd: RawFd, len: usize, peer: SocketAddr) -> Result<()> {
        if len == 0 {
            tracing::info!(fd, peer = %peer, "zero-length datagram, scheduling closure");
            if let Some(tracked) = self.tracked.get_mut(&fd) {
                tracked.hangup = true;
            }
            return Ok(());
        }

        let endpoint = self.registry.lookup(fd);
        tracing::trace!(fd, endpoint = %endpoint, peer = %peer, len, "datagram received");

        let outcome = self
            .engine
            .handle_datagram(&self.recv_buf[..len], self.actuator.as_mut());

        if let Outcome::Reply(reply) = outcome {
            self.send_reply(fd, &reply, peer)?;
        }

        Ok(())
    }

    fn send_reply(&self, fd: RawFd, reply: &[u8], peer: SocketAddr) -> Result<()> {
        let Some(tracked) = self.tracked.get(&fd) else {
            return Ok(());
        };
        let TrackedIo::Udp(socket) = &tracked.io else {
            return Ok(());
        };

        match socket.try_send_to(reply, peer) {
            Ok(sent) => {
                tracing::trace!(fd, peer = %peer, len = sent, "reply sent");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                tracing::warn!(fd, peer = %peer, "send would block, reply dropped");
                Ok(())
            }
            Err(source) => Err(Error::Socket { fd, source }),
        }
    }

    /// Receive until the kernel reports would-block, or a hangup is flagged
    fn drain_udp(&mut self, fd: RawFd) -> Result<()> {
        loop {
            if self.tracked.get(&fd).map_or(true, |t| t.hangup) {
                return Ok(());
            }

            let received = {
                let Some(tracked) = self.tracked.get(&fd) else {
                    return Ok(());
                };
                let TrackedIo::Udp(socket) = &tracked.io else {
                    return Ok(());
                };

                match socket.try_recv_from(&mut self.recv_buf) {
                    Ok((len, peer)) => (len, peer),
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                    Err(source) => return Err(Error::Socket { fd, source }),
                }
            };

            self.handle_datagram(fd, received.0, received.1)?;
        }
    }

    fn close_if_hangup(&mut self, fd: RawFd) {
        if self.tracked.get(&fd).map_or(false, |t| t.hangup) {
            self.close_descriptor(fd);
        }
    }

    /// Stop tracking `fd`, drop its registry entry and close the handle
    fn close_descriptor(&mut self, fd: RawFd) {
        if let Some(tracked) = self.tracked.remove(&fd) {
            tracing::info!(fd, kind = ?tracked.kind(), "descriptor closed");
        }
        if let Some(endpoint) = self.registry.remove(fd) {
            tracing::info!(fd, endpoint = %endpoint, "endpoint released");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use bytes::BytesMut;

    use super::*;
    use crate::protocol::header::{Header, PAYLOAD_TYPE_COMMAND, PAYLOAD_TYPE_CONTROL};

    #[derive(Clone, Default)]
    struct SharedRecorder {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Actuator for SharedRecorder {
        fn drive(&mut self, vertical: i8, horizontal: i8, pan_speed: u8, tilt_speed: u8) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("drive {vertical} {horizontal} {pan_speed} {tilt_speed}"));
        }

        fn absolute_move(&mut self, _speed: u8, _pan: [u8; 5], _tilt: [u8; 4]) {
            self.calls.lock().unwrap().push("absolute_move".into());
        }

        fn relative_move(&mut self, _speed: u8, _pan: [u8; 5], _tilt: [u8; 4]) {
            self.calls.lock().unwrap().push("relative_move".into());
        }

        fn home(&mut self) {
            self.calls.lock().unwrap().push("home".into());
        }

        fn reset(&mut self) {
            self.calls.lock().unwrap().push("reset".into());
        }

        fn limit_set(&mut self, _position: u8, _pan: [u8; 5], _tilt: [u8; 4]) {
            self.calls.lock().unwrap().push("limit_set".into());
        }

        fn limit_clear(&mut self, _position: u8) {
            self.calls.lock().unwrap().push("limit_clear".into());
        }

        fn ramp_curve(&mut self, value: u8) {
            self.calls.lock().unwrap().push(format!("ramp_curve {value}"));
        }

        fn slow_mode(&mut self, value: u8) {
            self.calls.lock().unwrap().push(format!("slow_mode {value}"));
        }
    }

    fn frame(payload_type: u16, seq_number: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = BytesMut::new();
        Header {
            payload_type,
            payload_length: payload.len() as u16,
            seq_number,
        }
        .encode(&mut out);
        out.extend_from_slice(payload);
        out.to_vec()
    }

    fn localhost_config() -> GatewayConfig {
        GatewayConfig::default().bind(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    async fn client() -> UdpSocket {
        UdpSocket::bind("127.0.0.1:0").await.unwrap()
    }

    #[tokio::test]
    async fn test_control_reset_round_trip() {
        let mut dispatcher = Dispatcher::new(localhost_config(), Box::new(SharedRecorder::default()));
        assert!(dispatcher
            .add_address_with_port(18071, "192.168.0.71")
            .await
            .unwrap());

        let handle = tokio::spawn(async move { dispatcher.run().await });

        let client = client().await;
        client
            .send_to(&frame(PAYLOAD_TYPE_CONTROL, 99, &[0x01]), "127.0.0.1:18071")
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buf))
            .await
            .expect("no reply within timeout")
            .unwrap();

        // Control reply with the sequence number zeroed by RESET.
        assert_eq!(len, 9);
        assert_eq!(&buf[..9], &[0x02, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01]);

        handle.abort();
    }

    #[tokio::test]
    async fn test_directional_command_reaches_actuator() {
        let recorder = SharedRecorder::default();
        let calls = Arc::clone(&recorder.calls);

        let mut dispatcher = Dispatcher::new(localhost_config(), Box::new(recorder));
        // "192.168.1.72" derives port 1072.
        assert!(dispatcher.add_address("192.168.1.72").await.unwrap());

        let handle = tokio::spawn(async move { dispatcher.run().await });

        let client = client().await;
        let payload = [0x81, 0x01, 0x06, 0x01, 0x05, 0x05, 0x01, 0x03, 0xFF];
        client
            .send_to(&frame(PAYLOAD_TYPE_COMMAND, 1, &payload), "127.0.0.1:1072")
            .await
            .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            {
                let calls = calls.lock().unwrap();
                if !calls.is_empty() {
                    assert_eq!(calls.len(), 1);
                    assert_eq!(calls[0], "drive 0 -1 5 5");
                    break;
                }
            }
            assert!(tokio::time::Instant::now() < deadline, "actuator never called");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_zero_length_datagram_closes_endpoint() {
        let mut dispatcher = Dispatcher::new(localhost_config(), Box::new(SharedRecorder::default()));
        assert!(dispatcher
            .add_address_with_port(18072, "192.168.0.72")
            .await
            .unwrap());

        let handle = tokio::spawn(async move { dispatcher.run().await });

        let client = client().await;
        client.send_to(&[], "127.0.0.1:18072").await.unwrap();

        // The endpoint closes after the empty datagram, so a later RESET
        // goes unanswered.
        client
            .send_to(&frame(PAYLOAD_TYPE_CONTROL, 1, &[0x01]), "127.0.0.1:18072")
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let reply = tokio::time::timeout(Duration::from_millis(500), client.recv_from(&mut buf)).await;
        assert!(reply.is_err(), "closed endpoint must not reply");

        handle.abort();
    }

    #[tokio::test]
    async fn test_tcp_listener_accepts_and_drops() {
        let mut dispatcher = Dispatcher::new(localhost_config(), Box::new(SharedRecorder::default()));
        assert!(dispatcher
            .add_address_with_port(18073, "192.168.0.73")
            .await
            .unwrap());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let listen_addr = listener.local_addr().unwrap();
        dispatcher.track_tcp_listener(listener);

        let handle = tokio::spawn(async move { dispatcher.run().await });

        // The connection is accepted and dropped; the UDP path stays live.
        let _stream = tokio::net::TcpStream::connect(listen_addr).await.unwrap();

        let client = client().await;
        client
            .send_to(&frame(PAYLOAD_TYPE_CONTROL, 7, &[0x01]), "127.0.0.1:18073")
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buf))
            .await
            .expect("no reply within timeout")
            .unwrap();
        assert_eq!(len, 9);

        handle.abort();
    }

    #[tokio::test]
    async fn test_malformed_datagram_gets_no_reply() {
        let mut dispatcher = Dispatcher::new(localhost_config(), Box::new(SharedRecorder::default()));
        assert!(dispatcher
            .add_address_with_port(18074, "192.168.0.74")
            .await
            .unwrap());

        let handle = tokio::spawn(async move { dispatcher.run().await });

        let client = client().await;

        // Declared length disagrees with the wire: dropped silently.
        let mut bad = frame(PAYLOAD_TYPE_CONTROL, 1, &[0x01]);
        bad[3] = 9;
        client.send_to(&bad, "127.0.0.1:18074").await.unwrap();

        let mut buf = [0u8; 64];
        let reply = tokio::time::timeout(Duration::from_millis(500), client.recv_from(&mut buf)).await;
        assert!(reply.is_err(), "malformed datagram must not be answered");

        // The loop is still alive afterwards.
        client
            .send_to(&frame(PAYLOAD_TYPE_CONTROL, 2, &[0x01]), "127.0.0.1:18074")
            .await
            .unwrap();
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buf))
            .await
            .expect("no reply within timeout")
            .unwrap();
        assert_eq!(len, 9);

        handle.abort();
    }
}
