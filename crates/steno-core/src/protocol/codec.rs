//! Binary codec for command and response frames.
//!
//! Wire format (see [`crate::protocol::packet`] for the field table):
//! ```text
//! [sync:2][seq:4][type:2][payload_len:4][file_offset:4][byte_count:4][reserved:12][payload:N]
//! ```
//! Header size: 32 bytes. All multi-byte integers are little-endian.

use std::ops::Range;

use thiserror::Error;

use crate::chord::Chord;
use crate::protocol::packet::{
    field, CommandPacket, ReadBytesParams, ResponseHeader, CHORD_SIZE, HEADER_SIZE,
    MAX_PAYLOAD_SIZE, STROKE_RECORD_SIZE, SYNC_MARKER,
};

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    /// The byte slice is shorter than the fixed header.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The payload would not fit in the frame's payload region.
    #[error("payload of {0} bytes exceeds the payload region")]
    PayloadTooLarge(usize),

    /// The header declares more payload than was received.
    #[error("payload length mismatch: header says {declared}, available is {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },

    /// The payload ends in a fragment too short to hold a chord.
    #[error("payload ends with a {remainder}-byte fragment, shorter than a chord")]
    TruncatedRecord { remainder: usize },
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encodes `packet` into the bytes put on the wire (header plus payload).
///
/// # Errors
///
/// Returns [`PacketError::PayloadTooLarge`] if the payload exceeds
/// [`MAX_PAYLOAD_SIZE`].
///
/// # Examples
///
/// ```rust
/// use steno_core::protocol::{encode_command, CommandPacket, HEADER_SIZE};
///
/// let bytes = encode_command(&CommandPacket::read_bytes(1, 0, 512)).unwrap();
/// assert_eq!(bytes.len(), HEADER_SIZE);
/// assert_eq!(&bytes[0..2], b"SG");
/// ```
pub fn encode_command(packet: &CommandPacket) -> Result<Vec<u8>, PacketError> {
    if packet.payload.len() > MAX_PAYLOAD_SIZE {
        return Err(PacketError::PayloadTooLarge(packet.payload.len()));
    }

    let mut buf = vec![0u8; packet.wire_len()];
    buf[field::SYNC].copy_from_slice(&SYNC_MARKER);
    put_u32(&mut buf, field::SEQUENCE, packet.sequence_number);
    buf[field::PACKET_TYPE].copy_from_slice(&(packet.packet_type as u16).to_le_bytes());
    put_u32(&mut buf, field::PAYLOAD_LEN, packet.payload.len() as u32);
    put_u32(&mut buf, field::PARAM_FILE_OFFSET, packet.params.file_offset);
    put_u32(&mut buf, field::PARAM_BYTE_COUNT, packet.params.byte_count);
    // field::PARAM_RESERVED stays zero
    buf[HEADER_SIZE..].copy_from_slice(&packet.payload);
    Ok(buf)
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decodes the fixed header at the start of a response frame.
///
/// The sync marker is returned as received and is not checked.
///
/// # Errors
///
/// Returns [`PacketError::InsufficientData`] if `bytes` is shorter than
/// [`HEADER_SIZE`].
pub fn decode_response_header(bytes: &[u8]) -> Result<ResponseHeader, PacketError> {
    if bytes.len() < HEADER_SIZE {
        return Err(PacketError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    Ok(ResponseHeader {
        sync: [bytes[0], bytes[1]],
        sequence_number: get_u32(bytes, field::SEQUENCE),
        packet_type: u16::from_le_bytes([bytes[6], bytes[7]]),
        payload_len: get_u32(bytes, field::PAYLOAD_LEN),
        params: ReadBytesParams {
            file_offset: get_u32(bytes, field::PARAM_FILE_OFFSET),
            byte_count: get_u32(bytes, field::PARAM_BYTE_COUNT),
        },
    })
}

/// Returns the payload slice declared by `header` within `frame`.
///
/// # Errors
///
/// Returns [`PacketError::PayloadLengthMismatch`] if the frame holds fewer
/// bytes than the header declares.
pub fn response_payload<'a>(
    header: &ResponseHeader,
    frame: &'a [u8],
) -> Result<&'a [u8], PacketError> {
    let range = header.payload_range();
    if frame.len() < range.end {
        return Err(PacketError::PayloadLengthMismatch {
            declared: header.payload_len as usize,
            available: frame.len().saturating_sub(HEADER_SIZE),
        });
    }
    Ok(&frame[range])
}

/// Splits a response payload into chords, in payload order.
///
/// Each stroke record is [`STROKE_RECORD_SIZE`] bytes; only its first
/// [`CHORD_SIZE`] bytes are key data.  A final record that still holds a
/// full chord is accepted.
///
/// # Errors
///
/// Returns [`PacketError::TruncatedRecord`] if the payload ends in a
/// fragment shorter than a chord.
pub fn split_chords(payload: &[u8]) -> Result<Vec<Chord>, PacketError> {
    let remainder = payload.len() % STROKE_RECORD_SIZE;
    if remainder != 0 && remainder < CHORD_SIZE {
        return Err(PacketError::TruncatedRecord { remainder });
    }

    Ok(payload
        .chunks(STROKE_RECORD_SIZE)
        .map(|record| Chord::from_bytes([record[0], record[1], record[2], record[3]]))
        .collect())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn put_u32(buf: &mut [u8], range: Range<usize>, value: u32) {
    buf[range].copy_from_slice(&value.to_le_bytes());
}

fn get_u32(bytes: &[u8], range: Range<usize>) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[range]);
    u32::from_le_bytes(raw)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
