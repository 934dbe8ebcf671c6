//! Reply frame composers
//!
//! The control reply is the only composer wired into a dispatch path
//! today. The ack/completion composers are part of the wire contract
//! peers expect for the command and inquiry categories, and stay
//! available for when those categories start producing output.

use bytes::{BufMut, BytesMut};

use super::header::{Header, PAYLOAD_TYPE_CONTROL_REPLY};

/// Terminator byte closing every camera-side reply frame
pub const TERMINATOR: u8 = 0xFF;

/// Compose the 9-byte control reply acknowledging a control command
pub fn compose_control_reply(out: &mut BytesMut, seq_number: u32) {
    Header {
        payload_type: PAYLOAD_TYPE_CONTROL_REPLY,
        payload_length: 1,
        seq_number,
    }
    .encode(out);

    out.put_u8(0x01);
}

/// Compose a command acknowledgement frame
pub fn compose_ack(out: &mut BytesMut) {
    out.put_slice(&[0x90, 0x40, TERMINATOR]);
}

/// Compose a completion frame carrying `data` (inquiry results etc.)
pub fn compose_completion(out: &mut BytesMut, data: &[u8]) {
    out.reserve(3 + data.len());
    out.put_u8(0x90);
    out.put_u8(0x50);
    out.put_slice(data);
    out.put_u8(TERMINATOR);
}

/// Compose a completion frame with no data
pub fn compose_empty_completion(out: &mut BytesMut) {
    compose_completion(out, &[]);
}
