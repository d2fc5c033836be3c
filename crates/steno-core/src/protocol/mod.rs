//! Protocol module containing the packet layout, the binary codec and
//! sequence numbering.

pub mod codec;
pub mod packet;
pub mod sequence;

pub use codec::{
    decode_response_header, encode_command, response_payload, split_chords, PacketError,
};
pub use packet::*;
pub use sequence::{SequenceCounter, INITIAL_SEQUENCE};
