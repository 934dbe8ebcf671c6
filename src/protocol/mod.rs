//! VISCA-over-IP protocol engine
//!
//! Wire format: every datagram starts with the fixed 8-byte envelope
//! (payload type, payload length, sequence number, network byte order)
//! followed by `payload length` bytes of payload. The engine validates
//! the envelope, dispatches on payload type and the nested command
//! bytes, and stages at most one reply frame per datagram.
//!
//! ```text
//! datagram ──► Header::decode ──► length check ──► payload-type dispatch
//!                                                   ├─ 0x0100 command ──► pan-tilt sub-dispatch ──► Actuator
//!                                                   ├─ 0x0200 control ──► reply::compose_control_reply
//!                                                   └─ others ──► logged / dropped
//! ```

pub mod engine;
pub mod header;
pub mod reply;

pub use engine::{DropReason, Engine, Outcome};
pub use header::Header;
