//! Integration tests for the steno-core packet codec and chord decoder.
//!
//! These tests go through the public API only, the way the protocol engine in
//! `steno-device` uses it: decode a response header, slice its payload, split
//! it into chords and decode each chord into a stroke.

use steno_core::{
    chord::{Chord, Key, Stroke},
    decode, decode_response_header, encode_command,
    protocol::{
        packet::{field, HEADER_SIZE, MAX_PACKET_SIZE},
        response_payload, split_chords, SequenceCounter,
    },
    CommandPacket,
};

/// Builds a response frame the way the machine sends it: header, payload,
/// then unused buffer space up to the full frame size.
fn machine_response(seq: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0u8; MAX_PACKET_SIZE];
    frame[field::SYNC].copy_from_slice(b"SG");
    frame[field::SEQUENCE].copy_from_slice(&seq.to_le_bytes());
    frame[field::PACKET_TYPE].copy_from_slice(&0x0013u16.to_le_bytes());
    frame[field::PAYLOAD_LEN].copy_from_slice(&(payload.len() as u32).to_le_bytes());
    frame[HEADER_SIZE..HEADER_SIZE + payload.len()].copy_from_slice(payload);
    frame
}

fn strokes_of(frame: &[u8]) -> Vec<Stroke> {
    let header = decode_response_header(frame).expect("header must decode");
    let payload = response_payload(&header, frame).expect("payload must fit");
    split_chords(payload)
        .expect("payload must be aligned")
        .into_iter()
        .map(Stroke::new)
        .collect()
}

#[test]
fn test_first_read_command_uses_sequence_one_and_offset_zero() {
    // Arrange
    let counter = SequenceCounter::new();

    // Act
    let bytes = encode_command(&CommandPacket::read_bytes(counter.expected(), 0, 512))
        .expect("encode must succeed");
    let header = decode_response_header(&bytes).expect("decode must succeed");

    // Assert
    assert_eq!(header.sequence_number, 1);
    assert_eq!(header.params.file_offset, 0);
    assert_eq!(header.params.byte_count, 512);
}

#[test]
fn test_single_left_s_record_decodes_to_one_stroke() {
    // Arrange – one 8-byte record, chord has only the left S flag
    let frame = machine_response(1, &[0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

    // Act
    let strokes = strokes_of(&frame);

    // Assert
    assert_eq!(strokes.len(), 1);
    assert_eq!(strokes[0].steno(), "S");
}

#[test]
fn test_multiple_records_decode_in_payload_order() {
    // Arrange – "KAT", "*", "1-9"
    let payload = [
        0x02, 0x04, 0x00, 0x08, 0, 0, 0, 0, //
        0x00, 0x01, 0x00, 0x00, 0, 0, 0, 1, //
        0x18, 0x00, 0x00, 0x08, 0, 0, 0, 2,
    ];
    let frame = machine_response(5, &payload);

    // Act
    let steno: Vec<String> = strokes_of(&frame).into_iter().map(Stroke::into_steno).collect();

    // Assert
    assert_eq!(steno, vec!["KAT", "*", "1-9"]);
}

#[test]
fn test_stenomark_marker_bit_alone_renders_empty_stroke() {
    // 0x20 in byte 0 is the stenomark marker, not a key
    let stroke = decode(0x20, 0x00, 0x00, 0x00);
    assert_eq!(stroke.steno(), "");
    assert!(stroke.has_stenomark());
}

#[test]
fn test_stroke_serializes_with_steno_text() {
    // Arrange
    let stroke = Stroke::new(Chord::from_keys([Key::LeftT, Key::E, Key::RightS, Key::RightT]));

    // Act
    let json = serde_json::to_value(&stroke).expect("serialize");

    // Assert
    assert_eq!(json["steno"], "TETS");
    assert_eq!(json["chord"], stroke.chord().bits());
}
