use std::fmt;

use heapless::Vec;

use crate::{Error, Result};

pub const HANDSHAKE_HEADER: [u8; 3] = [0x02, 0x00, 0x00];
pub const CONFIRM_HEADER: [u8; 3] = [0x02, 0x00, 0x02];
pub const PACKET_HEADER: [u8; 3] = [0x02, 0x00, 0x03];

pub const MIN_FRAME_LEN: usize = 8;
pub const MAX_FRAME_LEN: usize = 17;

/// Offset of the length byte; it holds `total - LENGTH_BIAS`.
pub const LENGTH_OFFSET: usize = 6;
pub const LENGTH_BIAS: usize = 8;

const TYPE_OFFSET: usize = 3;
const COUNTER_OFFSET: usize = 4;
const FIXED_BLOCK: [u8; 3] = [0x01, 0x30, 0x01];

const COMMAND_LEN_OFFSET: usize = 11;
const COMMAND_OVERHEAD: usize = 13;
const COMMAND_CHECKSUM_BASE: u16 = 438;

const REPLY_LEN_OFFSET: usize = 13;
const REPLY_OVERHEAD: usize = 15;
const REPLY_CHECKSUM_BASE: u16 = 308;

/// Largest payload a command frame can carry.
pub const MAX_COMMAND_PAYLOAD: usize = MAX_FRAME_LEN - COMMAND_OVERHEAD;
/// Largest payload a reply frame can carry.
pub const MAX_REPLY_PAYLOAD: usize = MAX_FRAME_LEN - REPLY_OVERHEAD;

pub type FrameBuf = Vec<u8, MAX_FRAME_LEN>;

byte_table! {
    /// Frame type byte at offset 3.
    pub enum PacketType {
        SynAck = 128 => "SYN/ACK",
        Ack = 130 => "ACK",
        Command = 16 => "COMMAND",
        Feedback = 17 => "FEEDBACK",
        Reply = 144 => "REPLY",
    }
}

impl PacketType {
    fn layout(self) -> Option<(usize, u16)> {
        match self {
            PacketType::Command | PacketType::Feedback => {
                Some((COMMAND_LEN_OFFSET, COMMAND_CHECKSUM_BASE))
            }
            PacketType::Reply => Some((REPLY_LEN_OFFSET, REPLY_CHECKSUM_BASE)),
            _ => None,
        }
    }
}

/// `base - 2 * len - sum(payload)`, in 16-bit wrapping arithmetic, low byte.
pub fn checksum(base: u16, payload: &[u8]) -> u8 {
    let len = payload.len() as u16;
    let sum = payload
        .iter()
        .fold(base.wrapping_sub(len.wrapping_mul(2)), |acc, b| {
            acc.wrapping_sub(u16::from(*b))
        });
    sum.to_le_bytes()[0]
}

/// Build a command (query or setting change) frame.
pub fn encode_command(payload: &[u8]) -> Result<FrameBuf> {
    encode(
        PacketType::Command,
        COMMAND_LEN_OFFSET,
        COMMAND_CHECKSUM_BASE,
        payload,
    )
}

/// Build a reply frame.
pub fn encode_reply(payload: &[u8]) -> Result<FrameBuf> {
    encode(PacketType::Reply, REPLY_LEN_OFFSET, REPLY_CHECKSUM_BASE, payload)
}

fn encode(
    packet_type: PacketType,
    len_offset: usize,
    base: u16,
    payload: &[u8],
) -> Result<FrameBuf> {
    let data_offset = len_offset + 1;
    let total = data_offset + payload.len() + 1;
    if total > MAX_FRAME_LEN {
        return Err(Error::PayloadTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN - data_offset - 1,
        });
    }

    let mut frame = FrameBuf::new();
    frame
        .resize(total, 0)
        .map_err(|_| Error::InvalidFrameLength(total))?;
    frame[..3].copy_from_slice(&PACKET_HEADER);
    frame[TYPE_OFFSET] = packet_type.to_byte().unwrap_or_default();
    frame[LENGTH_OFFSET] = (total - LENGTH_BIAS) as u8;
    frame[7..10].copy_from_slice(&FIXED_BLOCK);
    frame[len_offset] = payload.len() as u8;
    frame[data_offset..data_offset + payload.len()].copy_from_slice(payload);
    frame[total - 1] = checksum(base, payload);
    Ok(frame)
}

/// Why a candidate frame was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    TooShort(usize),
    BadHeader,
    LengthMismatch { declared: usize, actual: usize },
    PayloadOverrun { declared: usize },
    BadChecksum { expected: u8, actual: u8 },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::TooShort(len) => write!(f, "frame too short ({len} bytes)"),
            FrameError::BadHeader => write!(f, "unrecognised frame header"),
            FrameError::LengthMismatch { declared, actual } => {
                write!(f, "length field says {declared} bytes, got {actual}")
            }
            FrameError::PayloadOverrun { declared } => {
                write!(f, "payload of {declared} bytes overruns frame")
            }
            FrameError::BadChecksum { expected, actual } => {
                write!(f, "invalid checksum (expected {expected:#04x}, actual {actual:#04x})")
            }
        }
    }
}

/// A validated inbound frame borrowing from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub packet_type: PacketType,
    /// Byte 4: the unit's running count of unsolicited feedback frames.
    pub counter: u8,
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Validate `raw`, which must hold exactly one frame starting at its header.
    pub fn parse(raw: &'a [u8], verify_checksum: bool) -> std::result::Result<Self, FrameError> {
        if raw.len() < MIN_FRAME_LEN {
            return Err(FrameError::TooShort(raw.len()));
        }
        if !starts_with_header(raw) {
            return Err(FrameError::BadHeader);
        }
        let declared = usize::from(raw[LENGTH_OFFSET]) + LENGTH_BIAS;
        if declared != raw.len() {
            return Err(FrameError::LengthMismatch {
                declared,
                actual: raw.len(),
            });
        }

        let packet_type = PacketType::from_byte(raw[TYPE_OFFSET]);
        let counter = raw[COUNTER_OFFSET];

        let Some((len_offset, base)) = packet_type.layout() else {
            return Ok(Self {
                packet_type,
                counter,
                payload: &[],
            });
        };

        let data_len = usize::from(*raw.get(len_offset).ok_or(FrameError::TooShort(raw.len()))?);
        let data_offset = len_offset + 1;
        if data_offset + data_len + 1 != raw.len() {
            return Err(FrameError::PayloadOverrun { declared: data_len });
        }
        let payload = &raw[data_offset..data_offset + data_len];

        if verify_checksum {
            let expected = checksum(base, payload);
            let actual = raw[raw.len() - 1];
            if expected != actual {
                return Err(FrameError::BadChecksum { expected, actual });
            }
        }

        Ok(Self {
            packet_type,
            counter,
            payload,
        })
    }
}

pub const KNOWN_HEADERS: [[u8; 3]; 3] = [HANDSHAKE_HEADER, CONFIRM_HEADER, PACKET_HEADER];

pub fn starts_with_header(bytes: &[u8]) -> bool {
    KNOWN_HEADERS.iter().any(|h| bytes.starts_with(h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_frame_layout() {
        let frame = encode_command(&[0xb3]).unwrap();
        assert_eq!(
            &frame[..],
            &[0x02, 0x00, 0x03, 0x10, 0x00, 0x00, 0x06, 0x01, 0x30, 0x01, 0x00, 0x01, 0xb3, 0x01]
        );
    }

    #[test]
    fn setting_frame_layout() {
        // STATE on
        let frame = encode_command(&[0x80, 0x30]).unwrap();
        assert_eq!(frame.len(), 15);
        assert_eq!(frame[LENGTH_OFFSET], 7);
        assert_eq!(frame[11], 2);
        assert_eq!(&frame[12..14], &[0x80, 0x30]);
        // 438 - 4 - 128 - 48 = 258 -> 0x02
        assert_eq!(frame[14], 0x02);
    }

    #[test]
    fn reply_frame_layout() {
        let frame = encode_reply(&[0xbb, 0x16]).unwrap();
        assert_eq!(frame.len(), MAX_FRAME_LEN);
        assert_eq!(frame[TYPE_OFFSET], 144);
        assert_eq!(frame[LENGTH_OFFSET], 9);
        assert_eq!(frame[13], 2);
        assert_eq!(&frame[14..16], &[0xbb, 0x16]);
        assert_eq!(frame[16], checksum(308, &[0xbb, 0x16]));
    }

    #[test]
    fn length_field_tracks_payload() {
        for n in 0..=MAX_COMMAND_PAYLOAD {
            let payload = [0x11u8; MAX_COMMAND_PAYLOAD];
            let frame = encode_command(&payload[..n]).unwrap();
            assert_eq!(frame.len(), n + COMMAND_OVERHEAD);
            assert_eq!(usize::from(frame[LENGTH_OFFSET]) + LENGTH_BIAS, frame.len());
        }
        for n in 0..=MAX_REPLY_PAYLOAD {
            let payload = [0x22u8; MAX_REPLY_PAYLOAD];
            let frame = encode_reply(&payload[..n]).unwrap();
            assert_eq!(frame.len(), n + REPLY_OVERHEAD);
            assert_eq!(usize::from(frame[LENGTH_OFFSET]) + LENGTH_BIAS, frame.len());
        }
    }

    #[test]
    fn oversized_payload_rejected() {
        let err = encode_command(&[0; MAX_COMMAND_PAYLOAD + 1]).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { len: 5, max: 4 }));
        let err = encode_reply(&[0; 3]).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { len: 3, max: 2 }));
    }

    #[test]
    fn checksum_folds_into_byte() {
        assert_eq!(checksum(438, &[]), 0xb6);
        assert_eq!(checksum(438, &[0xb3]), 0x01);
        // 438 - 4 - 247 - 10 = 177
        assert_eq!(checksum(438, &[0xf7, 0x0a]), 177);
        // underflow wraps
        assert_eq!(checksum(308, &[0xff, 0xff]), (308i32 - 4 - 510).rem_euclid(256) as u8);
    }

    #[test]
    fn parse_recovers_what_was_encoded() {
        let built = encode_command(&[0xb0, 0x42]).unwrap();
        let frame = Frame::parse(&built, true).unwrap();
        assert_eq!(frame.packet_type, PacketType::Command);
        assert_eq!(frame.payload, &[0xb0, 0x42]);

        let built = encode_reply(&[0xbe]).unwrap();
        let frame = Frame::parse(&built, true).unwrap();
        assert_eq!(frame.packet_type, PacketType::Reply);
        assert_eq!(frame.payload, &[0xbe]);
    }

    #[test]
    fn parse_feedback_frame() {
        let mut raw = encode_command(&[0xbb, 0x17]).unwrap();
        raw[TYPE_OFFSET] = 17;
        raw[COUNTER_OFFSET] = 3;
        let frame = Frame::parse(&raw, true).unwrap();
        assert_eq!(frame.packet_type, PacketType::Feedback);
        assert_eq!(frame.counter, 3);
        assert_eq!(frame.payload, &[0xbb, 0x17]);
    }

    #[test]
    fn parse_handshake_frame_has_no_payload() {
        let raw = [0x02, 0x00, 0x00, 0x80, 0x00, 0x00, 0x00, 0x7e];
        let frame = Frame::parse(&raw, true).unwrap();
        assert_eq!(frame.packet_type, PacketType::SynAck);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn parse_rejects_bad_checksum_only_when_verifying() {
        let mut raw = encode_command(&[0xb3, 0x16]).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        assert!(matches!(
            Frame::parse(&raw, true),
            Err(FrameError::BadChecksum { .. })
        ));
        assert!(Frame::parse(&raw, false).is_ok());
    }

    #[test]
    fn parse_rejects_malformed_lengths_without_panicking() {
        let built = encode_command(&[0xb3, 0x16]).unwrap();
        assert_eq!(Frame::parse(&built[..5], true), Err(FrameError::TooShort(5)));
        assert!(matches!(
            Frame::parse(&built[..built.len() - 1], true),
            Err(FrameError::LengthMismatch { .. })
        ));

        let mut raw = built.clone();
        raw[COMMAND_LEN_OFFSET] = 200;
        assert_eq!(
            Frame::parse(&raw, true),
            Err(FrameError::PayloadOverrun { declared: 200 })
        );

        let mut raw = built;
        raw[0] = 0x03;
        assert_eq!(Frame::parse(&raw, true), Err(FrameError::BadHeader));
    }
}
