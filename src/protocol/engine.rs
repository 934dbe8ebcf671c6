//! Protocol engine
//!
//! Validates the envelope, dispatches on payload type and nested command
//! bytes, invokes the actuator for pan-tilt-drive commands, and stages at
//! most one reply frame per datagram. Only the control channel produces
//! replies today; the camera-command category is accepted and acted on
//! without acknowledgement.

use bytes::{Bytes, BytesMut};

use crate::actuator::Actuator;

use super::header::{
    Header, HEADER_LENGTH, PAYLOAD_TYPE_COMMAND, PAYLOAD_TYPE_CONTROL,
    PAYLOAD_TYPE_CONTROL_REPLY, PAYLOAD_TYPE_DEVICE_SETTING, PAYLOAD_TYPE_INQUIRY,
    PAYLOAD_TYPE_REPLY,
};
use super::reply;

/// Camera address byte opening every command payload
const COMMAND_ADDRESS: u8 = 0x81;
/// Command marker following the address byte
const COMMAND_MARKER: u8 = 0x01;
/// Pan-tilt-drive command category
const CATEGORY_PAN_TILT_DRIVE: u8 = 0x06;

/// Control channel RESET
const CONTROL_RESET: u8 = 0x01;
/// Control channel ERROR
const CONTROL_ERROR: u8 = 0x0F;

/// Why a datagram was discarded without effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Shorter than the 8-byte envelope
    TruncatedHeader { length: usize },
    /// Declared payload length disagrees with the bytes on the wire
    LengthMismatch { declared: u16, actual: usize },
    /// Payload type not in the dispatch table
    UnknownPayloadType(u16),
    /// Command payload too short to carry a command
    CommandTooShort { length: usize },
    /// Command payload did not start with the fixed two-byte prefix
    BadCommandPrefix { first: u8, second: u8 },
    /// Command category with no implementation
    UnsupportedCategory(u8),
    /// Pan-tilt-drive sub-type with no implementation
    UnknownPanTiltOp(u8),
    /// Wrong fixed length for a sub-command
    BadLength {
        op: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Field value outside its permitted set
    BadFieldValue { field: &'static str, value: u8 },
    /// Control command byte not in the dispatch table
    UnknownControlOp(u8),
    /// Control ERROR message with an unrecognized error code
    UnknownErrorCode(u8),
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::TruncatedHeader { length } => {
                write!(f, "datagram of {} bytes is shorter than the header", length)
            }
            DropReason::LengthMismatch { declared, actual } => {
                write!(
                    f,
                    "declared payload length {} but {} bytes follow the header",
                    declared, actual
                )
            }
            DropReason::UnknownPayloadType(t) => write!(f, "unknown payload type {:#06x}", t),
            DropReason::CommandTooShort { length } => {
                write!(f, "command payload of {} bytes is too short", length)
            }
            DropReason::BadCommandPrefix { first, second } => {
                write!(f, "unexpected command prefix {:#04x} {:#04x}", first, second)
            }
            DropReason::UnsupportedCategory(c) => {
                write!(f, "unsupported command category {:#04x}", c)
            }
            DropReason::UnknownPanTiltOp(op) => {
                write!(f, "unknown pan-tilt-drive sub-type {:#04x}", op)
            }
            DropReason::BadLength {
                op,
                expected,
                actual,
            } => write!(f, "{}: bad length {}, expected {}", op, actual, expected),
            DropReason::BadFieldValue { field, value } => {
                write!(f, "unexpected {} value {:#04x}", field, value)
            }
            DropReason::UnknownControlOp(op) => {
                write!(f, "unknown control command {:#04x}", op)
            }
            DropReason::UnknownErrorCode(code) => {
                write!(f, "unknown control error code {:#04x}", code)
            }
        }
    }
}

/// Result of feeding one datagram to the engine
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Handled; the staged reply goes back to the sender
    Reply(Bytes),
    /// Handled; nothing to send
    Silent,
    /// Discarded with no actuator call and no reply
    Dropped(DropReason),
}

/// Decodes datagrams and stages replies
///
/// Owns one reply scratch buffer, reused across invocations. The
/// dispatcher drives the engine from a single task, so the scratch is
/// never shared between concurrent calls.
pub struct Engine {
    reply: BytesMut,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            reply: BytesMut::with_capacity(64),
        }
    }

    /// Decode and dispatch one datagram, producing at most one staged reply
    pub fn handle_datagram(&mut self, datagram: &[u8], actuator: &mut dyn Actuator) -> Outcome {
        let header = match Header::decode(datagram) {
            Some(header) => header,
            None => {
                return self.dropped(DropReason::TruncatedHeader {
                    length: datagram.len(),
                })
            }
        };

        let payload = &datagram[HEADER_LENGTH..];

        if header.payload_length as usize != payload.len() {
            return self.dropped(DropReason::LengthMismatch {
                declared: header.payload_length,
                actual: payload.len(),
            });
        }

        tracing::trace!(
            payload_type = header.payload_type,
            payload_length = header.payload_length,
            seq = header.seq_number,
            "datagram decoded"
        );

        let result = match header.payload_type {
            PAYLOAD_TYPE_COMMAND => handle_command(payload, actuator).map(|_| None),
            PAYLOAD_TYPE_INQUIRY => {
                tracing::debug!(seq = header.seq_number, "inquiry accepted, no output yet");
                Ok(None)
            }
            PAYLOAD_TYPE_REPLY => {
                tracing::debug!(seq = header.seq_number, "reply accepted");
                Ok(None)
            }
            PAYLOAD_TYPE_DEVICE_SETTING => {
                tracing::debug!(seq = header.seq_number, "device-setting command accepted");
                Ok(None)
            }
            PAYLOAD_TYPE_CONTROL => self
                .handle_control(payload, header.seq_number)
                .map(Some),
            PAYLOAD_TYPE_CONTROL_REPLY => {
                tracing::debug!(seq = header.seq_number, "control reply accepted");
                Ok(None)
            }
            other => Err(DropReason::UnknownPayloadType(other)),
        };

        match result {
            Ok(Some(staged)) => Outcome::Reply(staged),
            Ok(None) => Outcome::Silent,
            Err(reason) => self.dropped(reason),
        }
    }

    /// Control channel: RESET zeroes the echoed sequence number, ERROR is
    /// logged. Every accepted control command is acknowledged.
    fn handle_control(&mut self, payload: &[u8], seq_number: u32) -> Result<Bytes, DropReason> {
        if payload.is_empty() {
            return Err(DropReason::CommandTooShort { length: 0 });
        }

        let mut seq = seq_number;

        match payload[0] {
            CONTROL_RESET => {
                tracing::debug!(seq = seq_number, "control channel reset");
                seq = 0;
            }
            CONTROL_ERROR => {
                expect_length("control error", payload, 2)?;

                match payload[1] {
                    0x01 => {
                        tracing::warn!(seq = seq_number, "peer reported a sequence number error")
                    }
                    0x02 => {
                        tracing::warn!(seq = seq_number, "peer reported a message type error")
                    }
                    code => return Err(DropReason::UnknownErrorCode(code)),
                }
            }
            op => return Err(DropReason::UnknownControlOp(op)),
        }

        self.reply.clear();
        reply::compose_control_reply(&mut self.reply, seq);
        Ok(self.reply.split().freeze())
    }

    fn dropped(&self, reason: DropReason) -> Outcome {
        tracing::warn!(%reason, "datagram dropped");
        Outcome::Dropped(reason)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn handle_command(payload: &[u8], actuator: &mut dyn Actuator) -> Result<(), DropReason> {
    if payload.len() < 5 {
        return Err(DropReason::CommandTooShort {
            length: payload.len(),
        });
    }

    if payload[0] != COMMAND_ADDRESS || payload[1] != COMMAND_MARKER {
        return Err(DropReason::BadCommandPrefix {
            first: payload[0],
            second: payload[1],
        });
    }

    match payload[2] {
        CATEGORY_PAN_TILT_DRIVE => dispatch_pan_tilt_drive(payload, actuator),
        category => Err(DropReason::UnsupportedCategory(category)),
    }
}

fn dispatch_pan_tilt_drive(payload: &[u8], actuator: &mut dyn Actuator) -> Result<(), DropReason> {
    match payload[3] {
        0x01 => ptd_directionals(payload, actuator),
        0x02 => ptd_position(payload, actuator, false),
        0x03 => ptd_position(payload, actuator, true),
        0x04 => {
            actuator.home();
            Ok(())
        }
        0x05 => {
            actuator.reset();
            Ok(())
        }
        0x07 => ptd_pan_tilt_limit(payload, actuator),
        0x31 => ptd_ramp_curve(payload, actuator),
        0x44 => ptd_slow_mode(payload, actuator),
        op => Err(DropReason::UnknownPanTiltOp(op)),
    }
}

/// Directional drive or stop
fn ptd_directionals(payload: &[u8], actuator: &mut dyn Actuator) -> Result<(), DropReason> {
    expect_length("directionals", payload, 9)?;

    let pan_speed = payload[4];
    let tilt_speed = payload[5];

    let horizontal: i8 = match payload[6] {
        0x01 => -1,
        0x02 => 1,
        0x03 => 0,
        value => {
            return Err(DropReason::BadFieldValue {
                field: "horizontal drive",
                value,
            })
        }
    };

    let vertical: i8 = match payload[7] {
        0x01 => 1,
        0x02 => -1,
        0x03 => 0,
        value => {
            return Err(DropReason::BadFieldValue {
                field: "vertical drive",
                value,
            })
        }
    };

    actuator.drive(vertical, horizontal, pan_speed, tilt_speed);
    Ok(())
}

/// Absolute or relative position move
fn ptd_position(
    payload: &[u8],
    actuator: &mut dyn Actuator,
    relative: bool,
) -> Result<(), DropReason> {
    expect_length("position", payload, 16)?;

    let speed = payload[4];

    if payload[5] != 0 {
        return Err(DropReason::BadFieldValue {
            field: "position reserved byte",
            value: payload[5],
        });
    }

    let (pan, tilt) = pan_tilt_fields(payload);

    if relative {
        actuator.relative_move(speed, pan, tilt);
    } else {
        actuator.absolute_move(speed, pan, tilt);
    }

    Ok(())
}

fn ptd_pan_tilt_limit(payload: &[u8], actuator: &mut dyn Actuator) -> Result<(), DropReason> {
    expect_length("pan-tilt limit", payload, 16)?;

    let set = payload[4];

    // Odd set bytes are tolerated and fall through to the clear path.
    if set != 0 && set != 1 {
        tracing::warn!(value = set, "unexpected set byte in pan-tilt limit");
    }

    let position = payload[5];

    if set == 1 {
        let (pan, tilt) = pan_tilt_fields(payload);
        actuator.limit_set(position, pan, tilt);
    } else {
        actuator.limit_clear(position);
    }

    Ok(())
}

fn ptd_ramp_curve(payload: &[u8], actuator: &mut dyn Actuator) -> Result<(), DropReason> {
    expect_length("ramp curve", payload, 6)?;

    let value = payload[4];
    if !(1..=3).contains(&value) {
        return Err(DropReason::BadFieldValue {
            field: "ramp curve",
            value,
        });
    }

    actuator.ramp_curve(value);
    Ok(())
}

fn ptd_slow_mode(payload: &[u8], actuator: &mut dyn Actuator) -> Result<(), DropReason> {
    expect_length("slow mode", payload, 6)?;

    let value = payload[4];
    if value != 2 && value != 3 {
        return Err(DropReason::BadFieldValue {
            field: "slow mode",
            value,
        });
    }

    actuator.slow_mode(value);
    Ok(())
}

fn expect_length(op: &'static str, payload: &[u8], expected: usize) -> Result<(), DropReason> {
    if payload.len() != expected {
        return Err(DropReason::BadLength {
            op,
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}

/// Pan position is 5 raw bytes at [6, 11), tilt 4 raw bytes at [11, 15);
/// both are opaque nibble-packed fields passed through unmodified.
fn pan_tilt_fields(payload: &[u8]) -> ([u8; 5], [u8; 4]) {
    let mut pan = [0u8; 5];
    let mut tilt = [0u8; 4];
    pan.copy_from_slice(&payload[6..11]);
    tilt.copy_from_slice(&payload[11..15]);
    (pan, tilt)
}
