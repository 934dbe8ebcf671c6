//! Endpoint registry
//!
//! Maps each bound socket descriptor to the virtual camera endpoint it
//! serves, backed by a hand-built AVL tree, and tracks which listening
//! ports are in use. Ports are derived deterministically from camera
//! addresses; see [`derive_port`] for the arithmetic and its documented
//! limitations.

pub mod avl;
pub mod endpoint;
pub mod ports;
pub mod store;

pub use avl::AvlTree;
pub use endpoint::Endpoint;
pub use ports::{derive_port, PortTable};
pub use store::AddressRegistry;
