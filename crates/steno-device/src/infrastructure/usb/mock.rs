//! Scripted USB transport for tests and demos.
//!
//! # Why a mock transport?
//!
//! The real transport needs a steno machine on the bus.  `MockUsbTransport`
//! plays the machine's side of the protocol from a script instead:
//!
//! - every command written to it is recorded so tests can inspect the
//!   sequence numbers and offsets the engine sent;
//! - every read pops the next [`MockReply`] from the script.  Replies built
//!   from strokes echo the sequence number of the last command, so a script
//!   does not have to know which sequence number it will be asked for;
//! - once the script is exhausted every read answers "no data", which is
//!   what an idle machine does.
//!
//! # Usage in tests
//!
//! ```ignore
//! let transport = Arc::new(MockUsbTransport::with_replies(vec![
//!     MockReply::Strokes(vec![[0x08, 0, 0, 0]]),
//! ]));
//! let device = StenoDevice::with_transport(transport.clone(), DeviceConfig::default());
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use steno_core::protocol::{
    decode_response_header, encode_command, CommandPacket, ResponseHeader, CHORD_SIZE,
    STROKE_RECORD_SIZE,
};
use tokio_util::sync::CancellationToken;

use crate::application::transport::{Completion, TransferError, TransferTiming, UsbTransport};

/// One scripted answer to a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// A well-formed response carrying one stroke record per chord.
    Strokes(Vec<[u8; CHORD_SIZE]>),
    /// A well-formed response with a zero payload length.
    NoData,
    /// These exact bytes, transfer successful.
    Raw(Vec<u8>),
    /// These exact bytes, transfer ended with an error.
    RawWithStatus(Vec<u8>, TransferError),
    /// Nothing received, transfer ended with an error.
    Fail(TransferError),
}

#[derive(Default)]
struct Script {
    replies: VecDeque<MockReply>,
    written: Vec<Vec<u8>>,
    failing_writes: Option<(usize, TransferError)>,
    released: bool,
}

/// A transport that records commands and answers reads from a script.
#[derive(Default)]
pub struct MockUsbTransport {
    script: Mutex<Script>,
    releases: AtomicUsize,
}

impl MockUsbTransport {
    /// A transport with an empty script: every read answers "no data".
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: Vec<MockReply>) -> Self {
        let transport = Self::new();
        transport.script().replies.extend(replies);
        transport
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends a reply to the end of the script.
    pub fn push_reply(&self, reply: MockReply) {
        self.script().replies.push_back(reply);
    }

    /// Makes the next `count` writes fail with `error` without recording them.
    pub fn fail_writes(&self, count: usize, error: TransferError) {
        self.script().failing_writes = Some((count, error));
    }

    /// Raw bytes of every command written so far.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.script().written.clone()
    }

    /// Headers of every command written so far.  Commands and responses
    /// share one header layout.
    pub fn written_headers(&self) -> Vec<ResponseHeader> {
        self.script()
            .written
            .iter()
            .filter_map(|bytes| decode_response_header(bytes).ok())
            .collect()
    }

    /// Number of replies not yet consumed.
    pub fn remaining_replies(&self) -> usize {
        self.script().replies.len()
    }

    /// How many times `release` did real work.
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// Builds a response frame echoing `sequence_number` around `payload`.
pub fn response_frame(sequence_number: u32, payload: &[u8]) -> Vec<u8> {
    let mut packet = CommandPacket::read_bytes(sequence_number, 0, 0);
    packet.payload = payload.to_vec();
    // Payloads built here never exceed the payload region.
    encode_command(&packet).unwrap_or_default()
}

fn stroke_payload(chords: &[[u8; CHORD_SIZE]]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(chords.len() * STROKE_RECORD_SIZE);
    for chord in chords {
        payload.extend_from_slice(chord);
        payload.resize(payload.len() + STROKE_RECORD_SIZE - CHORD_SIZE, 0);
    }
    payload
}

#[async_trait]
impl UsbTransport for MockUsbTransport {
    async fn bulk_out(
        &self,
        data: Vec<u8>,
        _timing: TransferTiming,
        cancel: &CancellationToken,
    ) -> Completion<usize> {
        let mut script = self.script();
        if script.released {
            return Completion::failed(0, TransferError::Released);
        }
        if cancel.is_cancelled() {
            return Completion::failed(0, TransferError::Cancelled);
        }
        if let Some((remaining, error)) = script.failing_writes.take() {
            if remaining > 0 {
                if remaining > 1 {
                    script.failing_writes = Some((remaining - 1, error.clone()));
                }
                return Completion::failed(0, error);
            }
        }

        let len = data.len();
        script.written.push(data);
        Completion::ok(len)
    }

    async fn bulk_in(
        &self,
        capacity: usize,
        _timing: TransferTiming,
        cancel: &CancellationToken,
    ) -> Completion<Vec<u8>> {
        let mut script = self.script();
        if script.released {
            return Completion::failed(Vec::new(), TransferError::Released);
        }
        if cancel.is_cancelled() {
            return Completion::failed(Vec::new(), TransferError::Cancelled);
        }

        let echo = script
            .written
            .last()
            .and_then(|bytes| decode_response_header(bytes).ok())
            .map_or(0, |header| header.sequence_number);

        let (mut data, status) = match script.replies.pop_front().unwrap_or(MockReply::NoData) {
            MockReply::Strokes(chords) => (response_frame(echo, &stroke_payload(&chords)), Ok(())),
            MockReply::NoData => (response_frame(echo, &[]), Ok(())),
            MockReply::Raw(bytes) => (bytes, Ok(())),
            MockReply::RawWithStatus(bytes, error) => (bytes, Err(error)),
            MockReply::Fail(error) => (Vec::new(), Err(error)),
        };
        data.truncate(capacity);
        Completion { data, status }
    }

    async fn release(&self) {
        let mut script = self.script();
        if !script.released {
            script.released = true;
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}
