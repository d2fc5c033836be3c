//! Steno key identities and the packed key-state record of one chord.
//!
//! # How does the machine report a chord? (for beginners)
//!
//! A steno machine sends every stroke as four bytes.  The two highest bits of
//! each byte are unused; the low six bits are key flags, most significant
//! first:
//!
//! | Byte | 0x20 | 0x10 | 0x08 | 0x04 | 0x02 | 0x01 |
//! |------|------|------|------|------|------|------|
//! | 0    | ^    | #    | S-   | T-   | K-   | P-   |
//! | 1    | W-   | H-   | R-   | A-   | O-   | *    |
//! | 2    | -E   | -U   | -F   | -R   | -P   | -B   |
//! | 3    | -L   | -G   | -T   | -S   | -D   | -Z   |
//!
//! `^` is the stenomark marker and `#` the numeral bar.  Reading the table
//! row by row gives exactly the steno order used to render a stroke, so
//! [`Chord`] packs the 24 flags into a `u32` in that order: bit 23 is `^`,
//! bit 0 is `-Z`.

use serde::{Deserialize, Serialize};

/// Number of flag bits carried per chord byte.
const FLAGS_PER_BYTE: u32 = 6;

/// Mask selecting the six flag bits of a chord byte.
const FLAG_MASK: u8 = 0x3F;

/// Number of keys (flags) in a chord.
pub const KEY_COUNT: usize = 24;

/// One physical key (or modifier flag) of the steno keyboard.
///
/// Variants are declared in wire order, which is also steno order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    StenomarkMarker,
    NumeralBar,
    LeftS,
    LeftT,
    K,
    LeftP,
    W,
    H,
    LeftR,
    A,
    O,
    Asterisk,
    E,
    U,
    F,
    RightR,
    RightP,
    B,
    L,
    G,
    RightT,
    RightS,
    D,
    Z,
}

impl Key {
    /// Every key in wire (and steno) order.
    pub const ALL: [Key; KEY_COUNT] = [
        Key::StenomarkMarker,
        Key::NumeralBar,
        Key::LeftS,
        Key::LeftT,
        Key::K,
        Key::LeftP,
        Key::W,
        Key::H,
        Key::LeftR,
        Key::A,
        Key::O,
        Key::Asterisk,
        Key::E,
        Key::U,
        Key::F,
        Key::RightR,
        Key::RightP,
        Key::B,
        Key::L,
        Key::G,
        Key::RightT,
        Key::RightS,
        Key::D,
        Key::Z,
    ];

    /// Bit of this key inside a packed [`Chord`].
    pub const fn mask(self) -> u32 {
        1 << (KEY_COUNT as u32 - 1 - self as u32)
    }

    /// Letter printed for the key, or `None` for the two modifier flags.
    pub const fn letter(self) -> Option<char> {
        match self {
            Key::StenomarkMarker | Key::NumeralBar => None,
            Key::LeftS | Key::RightS => Some('S'),
            Key::LeftT | Key::RightT => Some('T'),
            Key::K => Some('K'),
            Key::LeftP | Key::RightP => Some('P'),
            Key::W => Some('W'),
            Key::H => Some('H'),
            Key::LeftR | Key::RightR => Some('R'),
            Key::A => Some('A'),
            Key::O => Some('O'),
            Key::Asterisk => Some('*'),
            Key::E => Some('E'),
            Key::U => Some('U'),
            Key::F => Some('F'),
            Key::B => Some('B'),
            Key::L => Some('L'),
            Key::G => Some('G'),
            Key::D => Some('D'),
            Key::Z => Some('Z'),
        }
    }

    /// Digit printed instead of the letter when the numeral bar is down.
    ///
    /// The right bank is not symmetric with the left one: `-L` is 8 and `-T`
    /// is 9.
    pub const fn digit(self) -> Option<char> {
        match self {
            Key::LeftS => Some('1'),
            Key::LeftT => Some('2'),
            Key::LeftP => Some('3'),
            Key::H => Some('4'),
            Key::A => Some('5'),
            Key::O => Some('0'),
            Key::F => Some('6'),
            Key::RightP => Some('7'),
            Key::L => Some('8'),
            Key::RightT => Some('9'),
            _ => None,
        }
    }

    /// `true` for the twelve keys right of the asterisk (`-E` through `-Z`).
    pub const fn is_right_bank(self) -> bool {
        (self as u32) >= (Key::E as u32)
    }
}

/// Packed key state of a single chord, one bit per [`Key`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chord(u32);

impl Chord {
    /// Mask of every right-bank key.
    pub const RIGHT_BANK: u32 = (1 << 12) - 1;

    /// Unpacks the four raw bytes reported by the machine.
    ///
    /// The two high bits of every byte are ignored.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        let bits = bytes
            .iter()
            .fold(0u32, |acc, b| (acc << FLAGS_PER_BYTE) | u32::from(b & FLAG_MASK));
        Self(bits)
    }

    /// Builds a chord with exactly the given keys pressed.
    pub fn from_keys<I: IntoIterator<Item = Key>>(keys: I) -> Self {
        Self(keys.into_iter().fold(0, |acc, key| acc | key.mask()))
    }

    /// Packs the chord back into the machine's four-byte form.
    pub fn to_bytes(self) -> [u8; 4] {
        let mut bytes = [0u8; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let shift = FLAGS_PER_BYTE * (3 - i as u32);
            *byte = ((self.0 >> shift) as u8) & FLAG_MASK;
        }
        bytes
    }

    /// Raw packed bits (bit 23 = stenomark marker, bit 0 = `-Z`).
    pub fn bits(self) -> u32 {
        self.0
    }

    /// `true` if `key` is down in this chord.
    pub fn is_pressed(self, key: Key) -> bool {
        self.0 & key.mask() != 0
    }

    /// `true` if no flag at all is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `true` if any key right of the asterisk is down.
    pub fn has_right_bank(self) -> bool {
        self.0 & Self::RIGHT_BANK != 0
    }

    /// Keys that are down, in steno order.
    pub fn pressed_keys(self) -> impl Iterator<Item = Key> {
        Key::ALL.into_iter().filter(move |key| self.is_pressed(*key))
    }
}
