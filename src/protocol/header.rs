//! Envelope header encode/decode
//!
//! Every VISCA-over-IP message starts with a fixed 8-byte header, all
//! fields in network byte order:
//!
//! ```text
//! 0               2               4                               8
//! +-------+-------+-------+-------+-------+-------+-------+-------+
//! | payload type  | payload len   |        sequence number        |
//! +-------+-------+-------+-------+-------+-------+-------+-------+
//! ```

use bytes::{Buf, BufMut, BytesMut};

/// Size of the envelope header in bytes
pub const HEADER_LENGTH: usize = 8;

/// VISCA command (full dispatch)
pub const PAYLOAD_TYPE_COMMAND: u16 = 0x0100;
/// VISCA inquiry (accepted, not yet answered)
pub const PAYLOAD_TYPE_INQUIRY: u16 = 0x0110;
/// VISCA reply (accepted, logged only)
pub const PAYLOAD_TYPE_REPLY: u16 = 0x0111;
/// Device-setting command (accepted, logged only)
pub const PAYLOAD_TYPE_DEVICE_SETTING: u16 = 0x0120;
/// Control command (full dispatch)
pub const PAYLOAD_TYPE_CONTROL: u16 = 0x0200;
/// Control reply (accepted, logged only)
pub const PAYLOAD_TYPE_CONTROL_REPLY: u16 = 0x0201;

/// The 8-byte envelope preceding every protocol payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Payload type discriminator, kept raw so unknown types stay loggable
    pub payload_type: u16,
    /// Declared payload length; must match the remaining byte count
    pub payload_length: u16,
    /// Sequence number echoed back in control replies
    pub seq_number: u32,
}

impl Header {
    /// Decode a header from the front of `buf`, or `None` if it is too short
    pub fn decode(mut buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_LENGTH {
            return None;
        }

        Some(Self {
            payload_type: buf.get_u16(),
            payload_length: buf.get_u16(),
            seq_number: buf.get_u32(),
        })
    }

    /// Append the encoded header to `out`
    pub fn encode(&self, out: &mut BytesMut) {
        out.reserve(HEADER_LENGTH);
        out.put_u16(self.payload_type);
        out.put_u16(self.payload_length);
        out.put_u32(self.seq_number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let cases = [
            (0x0100u16, 9u16, 1u32),
            (0x0200, 1, 99),
            (0x0201, 1, 0),
            (0, 0, 0),
            (u16::MAX, u16::MAX, u32::MAX),
        ];

        for (payload_type, payload_length, seq_number) in cases {
            let header = Header {
                payload_type,
                payload_length,
                seq_number,
            };

            let mut buf = BytesMut::new();
            header.encode(&mut buf);
            assert_eq!(buf.len(), HEADER_LENGTH);

            assert_eq!(Header::decode(&buf), Some(header));
        }
    }

    #[test]
    fn test_encoding_is_network_byte_order() {
        let header = Header {
            payload_type: 0x0201,
            payload_length: 1,
            seq_number: 0x01020304,
        };

        let mut buf = BytesMut::new();
        header.encode(&mut buf);

        assert_eq!(&buf[..], &[0x02, 0x01, 0x00, 0x01, 0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_decode_short_buffer() {
        assert_eq!(Header::decode(&[]), None);
        assert_eq!(Header::decode(&[0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]), None);
    }
}
