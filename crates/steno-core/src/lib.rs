//! # steno-core
//!
//! Shared library for talking to a Stentura-style steno machine: the chord
//! decoder and the binary packet protocol.
//!
//! This crate has zero dependencies on USB stacks, async runtimes, or the
//! console.  The `steno-device` crate builds the USB session, the protocol
//! engine and the stroke poller on top of it.
//!
//! # Architecture overview (for beginners)
//!
//! A steno machine is a chorded keyboard: the writer presses several keys at
//! once and the whole pattern (a *chord*) is one *stroke*.  The machine
//! buffers strokes internally and the host pulls them over USB with a simple
//! request/response protocol.
//!
//! - **`chord`** – Turns the four raw bytes of a chord into a [`Stroke`]
//!   with its canonical steno text, e.g. `"STKPW"`, `"-FRBGS"` or `"1-9"`.
//!
//! - **`protocol`** – The 32-byte frame header shared by commands and
//!   responses, the encode/decode functions over it, and the sequence counter
//!   used to match responses to requests.

pub mod chord;
pub mod protocol;

pub use chord::{decode, Chord, Key, Stroke};
pub use protocol::codec::{decode_response_header, encode_command, PacketError};
pub use protocol::packet::{CommandPacket, ResponseHeader};
