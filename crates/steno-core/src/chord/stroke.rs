//! Decoded strokes and their canonical steno text.

use std::fmt;

use serde::Serialize;

use super::keys::{Chord, Key};

/// A decoded chord together with its canonical steno string.
///
/// Strokes are immutable; the text is rendered once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Stroke {
    chord: Chord,
    steno: String,
}

impl Stroke {
    /// Decodes `chord` and renders its steno text.
    pub fn new(chord: Chord) -> Self {
        Self {
            chord,
            steno: render(chord),
        }
    }

    /// Key state of the stroke.
    pub fn chord(&self) -> Chord {
        self.chord
    }

    /// Canonical steno text, e.g. `"STKPW"`, `"-Z"`, `"1-9"` or `""`.
    pub fn steno(&self) -> &str {
        &self.steno
    }

    /// `true` if the numeral bar was down.
    pub fn is_numeral(&self) -> bool {
        self.chord.is_pressed(Key::NumeralBar)
    }

    /// `true` if the stenomark marker flag was set.
    pub fn has_stenomark(&self) -> bool {
        self.chord.is_pressed(Key::StenomarkMarker)
    }

    /// Consumes the stroke, returning its steno text.
    pub fn into_steno(self) -> String {
        self.steno
    }
}

impl From<Chord> for Stroke {
    fn from(chord: Chord) -> Self {
        Self::new(chord)
    }
}

impl fmt::Display for Stroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.steno)
    }
}

/// Renders the canonical steno string for `chord`.
///
/// Keys are emitted in steno order.  Between the left and right banks the
/// asterisk is printed if pressed; otherwise a `-` separates the banks when
/// right-bank keys are present but no vowel (A, O, E, U) already marks the
/// boundary.
fn render(chord: Chord) -> String {
    let numeral = chord.is_pressed(Key::NumeralBar);
    let needs_separator = chord.has_right_bank()
        && ![Key::A, Key::O, Key::E, Key::U]
            .into_iter()
            .any(|vowel| chord.is_pressed(vowel));

    let mut steno = String::with_capacity(24);
    for key in Key::ALL {
        if key == Key::Asterisk {
            if chord.is_pressed(Key::Asterisk) {
                steno.push('*');
            } else if needs_separator {
                steno.push('-');
            }
            continue;
        }
        if !chord.is_pressed(key) {
            continue;
        }
        let glyph = if numeral {
            key.digit().or_else(|| key.letter())
        } else {
            key.letter()
        };
        if let Some(c) = glyph {
            steno.push(c);
        }
    }
    steno
}
