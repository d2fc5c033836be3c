//! ProtocolEngine: one read-bytes request/response exchange at a time.
//!
//! The engine owns the session's protocol state (the sequence counter and
//! the running file offset) and talks to the machine through a
//! [`UsbTransport`].  It never publishes anything itself; every exchange
//! ends in a [`Response`] value that the stroke poller turns into events.
//!
//! # Validation order
//!
//! A received frame is checked in this order, and the first failing check
//! decides the outcome:
//!
//! 1. nothing received → [`Response::Empty`] (or [`Response::Failed`]);
//! 2. echoed sequence number differs → [`Response::SequenceMismatch`];
//! 3. *(sequence matched: the counter advances)*;
//! 4. fewer bytes than a header → [`Response::ShortPacket`];
//! 5. transfer reported an error → [`Response::Failed`];
//! 6. payload length is zero → [`Response::NoData`];
//! 7. payload truncated or misaligned → [`Response::ShortPacket`];
//! 8. the offset advances and the strokes are returned.
//!
//! The sync marker of a response is not checked.

use std::sync::Arc;

use steno_core::protocol::{
    decode_response_header, encode_command, response_payload, split_chords, CommandPacket,
    SequenceCounter, DEFAULT_READ_BYTE_COUNT, HEADER_SIZE, MAX_PACKET_SIZE,
};
use steno_core::Stroke;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::transport::{Completion, TransferError, TransferTiming, UsbTransport};

/// A response whose echoed sequence number was not the one expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceMismatch {
    /// Sequence number of the outstanding request.
    pub expected: u32,
    /// Sequence number found in the response.
    pub received: u32,
}

/// Outcome of [`ProtocolEngine::receive_response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The frame was accepted; strokes in payload order.
    Strokes(Vec<Stroke>),
    /// The transfer moved no bytes and reported no error.
    Empty,
    /// The frame answered a different request.
    SequenceMismatch(SequenceMismatch),
    /// The frame was too short for its header or its declared payload.
    ShortPacket { received: usize },
    /// The machine has no more buffered strokes.
    NoData,
    /// The transfer itself failed.
    Failed(TransferError),
}

/// Tunables of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub timing: TransferTiming,
    /// Bytes requested by each read command.
    pub read_byte_count: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timing: TransferTiming::default(),
            read_byte_count: DEFAULT_READ_BYTE_COUNT,
        }
    }
}

/// Drives the read-bytes exchange with one machine.
pub struct ProtocolEngine {
    transport: Arc<dyn UsbTransport>,
    config: EngineConfig,
    sequence: SequenceCounter,
    file_offset: u64,
}

impl ProtocolEngine {
    /// Creates an engine for a freshly opened session: sequence 1, offset 0.
    pub fn new(transport: Arc<dyn UsbTransport>, config: EngineConfig) -> Self {
        Self {
            transport,
            config,
            sequence: SequenceCounter::new(),
            file_offset: 0,
        }
    }

    /// Sequence number the next command carries.
    pub fn sequence_number(&self) -> u32 {
        self.sequence.expected()
    }

    /// Bytes of stroke data accepted so far in this session.
    pub fn file_offset(&self) -> u64 {
        self.file_offset
    }

    /// Sends a read-bytes command for the current sequence number and offset.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns the [`TransferError`] the OUT transfer ended with.
    pub async fn send_read_command(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<usize, TransferError> {
        // The wire field is 32 bits wide; the machine works modulo 2^32.
        let packet = CommandPacket::read_bytes(
            self.sequence.expected(),
            self.file_offset as u32,
            self.config.read_byte_count,
        );
        let bytes = encode_command(&packet).map_err(|e| TransferError::Submit(e.to_string()))?;

        trace!(
            seq = packet.sequence_number,
            offset = packet.params.file_offset,
            "sending read command"
        );
        let Completion { data, status } = self
            .transport
            .bulk_out(bytes, self.config.timing, cancel)
            .await;
        status.map(|()| data)
    }

    /// Reads one response frame and validates it.
    ///
    /// See the module docs for the order of checks.  Only an accepted frame
    /// advances the file offset.
    pub async fn receive_response(&mut self, cancel: &CancellationToken) -> Response {
        let Completion {
            data: mut frame,
            status,
        } = self
            .transport
            .bulk_in(MAX_PACKET_SIZE, self.config.timing, cancel)
            .await;

        let received = frame.len();
        if received == 0 {
            return match status {
                Err(e) => Response::Failed(e),
                Ok(()) => {
                    debug!("read completed with zero bytes");
                    Response::Empty
                }
            };
        }

        // Fields missing from a short frame read as zero.
        if received < HEADER_SIZE {
            frame.resize(HEADER_SIZE, 0);
        }
        let header = match decode_response_header(&frame) {
            Ok(header) => header,
            Err(e) => {
                warn!("undecodable response header: {e}");
                return Response::ShortPacket { received };
            }
        };

        if !self.sequence.matches(header.sequence_number) {
            let mismatch = SequenceMismatch {
                expected: self.sequence.expected(),
                received: header.sequence_number,
            };
            warn!(
                expected = mismatch.expected,
                received = mismatch.received,
                "response sequence number mismatch"
            );
            return Response::SequenceMismatch(mismatch);
        }
        self.sequence.advance();

        if received < HEADER_SIZE {
            warn!(received, "response shorter than packet header");
            return Response::ShortPacket { received };
        }
        if let Err(e) = status {
            return Response::Failed(e);
        }
        if header.payload_len == 0 {
            trace!("machine reports no buffered strokes");
            return Response::NoData;
        }

        let chords = match response_payload(&header, &frame[..received]).and_then(split_chords) {
            Ok(chords) => chords,
            Err(e) => {
                warn!(received, "rejecting response payload: {e}");
                return Response::ShortPacket { received };
            }
        };

        self.file_offset += u64::from(header.payload_len);
        debug!(
            strokes = chords.len(),
            offset = self.file_offset,
            "accepted response"
        );
        Response::Strokes(chords.into_iter().map(Stroke::new).collect())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
