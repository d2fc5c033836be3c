//! Packet layout shared by command and response frames.
//!
//! Every frame starts with the same 32-byte header, followed by a payload
//! region of up to [`MAX_PAYLOAD_SIZE`] bytes:
//!
//! ```text
//! offset  size  field
//!      0     2  sync marker "SG"
//!      2     4  sequence number
//!      6     2  packet type
//!      8     4  payload length
//!     12     4  param: file offset        (read-bytes)
//!     16     4  param: requested bytes    (read-bytes)
//!     20    12  param: reserved, 3 x u32
//!     32     N  payload, 0 <= N <= 65536
//! ```
//!
//! All multi-byte integers are little-endian.

use std::ops::Range;

/// Sync marker written at the start of every command frame.
pub const SYNC_MARKER: [u8; 2] = *b"SG";

/// Size of the fixed header (everything before the payload region).
pub const HEADER_SIZE: usize = 32;

/// Capacity of the payload region.
pub const MAX_PAYLOAD_SIZE: usize = 0x1_0000;

/// Full frame size: header plus a maximum payload.
pub const MAX_PACKET_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// Bytes requested from the machine by each read command.
pub const DEFAULT_READ_BYTE_COUNT: u32 = 512;

/// Size of the key bytes of one stroke record.
pub const CHORD_SIZE: usize = 4;

/// Size of one stroke record in the payload: 4 chord bytes plus 4 bytes of
/// device bookkeeping (a timestamp) that are not interpreted.
pub const STROKE_RECORD_SIZE: usize = 8;

/// Field-offset table of the header.
pub mod field {
    use std::ops::Range;

    pub const SYNC: Range<usize> = 0..2;
    pub const SEQUENCE: Range<usize> = 2..6;
    pub const PACKET_TYPE: Range<usize> = 6..8;
    pub const PAYLOAD_LEN: Range<usize> = 8..12;
    pub const PARAM_FILE_OFFSET: Range<usize> = 12..16;
    pub const PARAM_BYTE_COUNT: Range<usize> = 16..20;
    pub const PARAM_RESERVED: Range<usize> = 20..32;
}

/// Packet type codes understood by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PacketType {
    /// Read bytes from the machine's stroke file.
    ReadBytes = 0x0013,
}

impl TryFrom<u16> for PacketType {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x0013 => Ok(PacketType::ReadBytes),
            other => Err(other),
        }
    }
}

/// Parameters of a read-bytes command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadBytesParams {
    /// Offset into the machine's stroke file (low 32 bits of the running offset).
    pub file_offset: u32,
    /// Number of bytes requested.
    pub byte_count: u32,
}

/// An outbound command frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPacket {
    pub sequence_number: u32,
    pub packet_type: PacketType,
    pub params: ReadBytesParams,
    /// Payload carried after the header; empty for read-bytes.
    pub payload: Vec<u8>,
}

impl CommandPacket {
    /// Builds a read-bytes command.
    pub fn read_bytes(sequence_number: u32, file_offset: u32, byte_count: u32) -> Self {
        Self {
            sequence_number,
            packet_type: PacketType::ReadBytes,
            params: ReadBytesParams {
                file_offset,
                byte_count,
            },
            payload: Vec::new(),
        }
    }

    /// Number of bytes this command occupies on the wire.
    pub fn wire_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Header fields of an inbound response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Sync bytes as received; never validated.
    pub sync: [u8; 2],
    pub sequence_number: u32,
    /// Raw packet type code (echoes the command).
    pub packet_type: u16,
    pub payload_len: u32,
    pub params: ReadBytesParams,
}

impl ResponseHeader {
    /// Byte range of the payload this header declares.
    pub fn payload_range(&self) -> Range<usize> {
        HEADER_SIZE..HEADER_SIZE + self.payload_len as usize
    }
}
