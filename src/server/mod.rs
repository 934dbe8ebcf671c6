//! Dispatch loop and descriptor tracking

pub mod dispatcher;

pub use dispatcher::{Dispatcher, SocketKind};
