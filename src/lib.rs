//! VISCA-over-IP camera control gateway
//!
//! Receives the binary VISCA remote-control protocol over UDP, addressed
//! to one of many independently bound virtual camera endpoints, and turns
//! valid commands into semantic pan/tilt calls on an [`Actuator`].
//! Control-channel messages are acknowledged with protocol-correct reply
//! frames.
//!
//! # Architecture
//!
//! ```text
//!                      Dispatcher (one task)
//!            ┌────────────────────────────────────────┐
//!            │ tracked: fd -> socket                  │
//!            │ registry: fd -> Endpoint  (AVL tree)   │
//!            │ engine:   Engine + reply scratch       │
//!            │ actuator: Box<dyn Actuator>            │
//!            └───────────────────┬────────────────────┘
//!                                │ readiness poll over all sockets
//!          ┌─────────────────────┼─────────────────────┐
//!          ▼                     ▼                     ▼
//!     UDP :1077            UDP :3145             UDP :52381
//!     camera A             camera B              camera C
//! ```
//!
//! Each camera address gets its own listening port, derived from the
//! address or explicit for cameras discovered with a known port. The
//! dispatcher drains each ready socket until would-block, feeds every
//! datagram to the protocol engine, and sends staged replies back to the
//! originating peer.
//!
//! # Example
//!
//! ```no_run
//! use visca_gateway::{Dispatcher, GatewayConfig, TracingActuator};
//!
//! # async fn run() -> visca_gateway::Result<()> {
//! let config = GatewayConfig::default().camera("192.168.1.77");
//!
//! let mut dispatcher = Dispatcher::new(config, Box::new(TracingActuator));
//! dispatcher.register_cameras().await?;
//! dispatcher.run().await
//! # }
//! ```

pub mod actuator;
pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;

pub use actuator::{Actuator, TracingActuator};
pub use config::{CameraAddress, GatewayConfig};
pub use error::{Error, Result};
pub use server::Dispatcher;
