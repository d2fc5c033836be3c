//! Chord decoding: raw machine bytes to steno strokes.
//!
//! [`decode`] is a pure, total function; every one of the 2^24 flag
//! combinations decodes to exactly one [`Stroke`].

pub mod keys;
pub mod stroke;

pub use keys::{Chord, Key, KEY_COUNT};
pub use stroke::Stroke;

/// Decodes the four bytes of one chord into a [`Stroke`].
///
/// # Examples
///
/// ```rust
/// use steno_core::chord::decode;
///
/// assert_eq!(decode(0x08, 0x00, 0x00, 0x00).steno(), "S");
/// assert_eq!(decode(0x18, 0x00, 0x00, 0x00).steno(), "1");
/// assert_eq!(decode(0x00, 0x00, 0x00, 0x00).steno(), "");
/// ```
pub fn decode(byte0: u8, byte1: u8, byte2: u8, byte3: u8) -> Stroke {
    Stroke::new(Chord::from_bytes([byte0, byte1, byte2, byte3]))
}
