//! Sequence numbering for the request/response exchange.
//!
//! # What is the sequence number for? (for beginners)
//!
//! Every read command carries a sequence number and the machine echoes it in
//! its response.  Comparing the echoed value with the one we sent detects
//! responses that were lost, duplicated, or belong to an earlier request that
//! timed out on our side.
//!
//! The counter starts at 1 for a freshly opened session and only moves when a
//! response with the expected number arrives.  A mismatched response leaves
//! it untouched, so the next command repeats the same number.

/// First sequence number of a session.
pub const INITIAL_SEQUENCE: u32 = 1;

/// The sequence number the next command carries and the next response must
/// echo.
///
/// Wraps from `u32::MAX` to 0 without panicking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceCounter {
    expected: u32,
}

impl SequenceCounter {
    /// Creates a counter at [`INITIAL_SEQUENCE`].
    pub fn new() -> Self {
        Self {
            expected: INITIAL_SEQUENCE,
        }
    }

    /// Value to send in the next command and expect in the next response.
    pub fn expected(&self) -> u32 {
        self.expected
    }

    /// `true` if `received` is the value we are waiting for.
    pub fn matches(&self, received: u32) -> bool {
        received == self.expected
    }

    /// Moves past a matched response.
    pub fn advance(&mut self) {
        self.expected = self.expected.wrapping_add(1);
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
