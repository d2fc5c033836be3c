//! Integration tests for the stroke poller driven through `StenoDevice`.
//!
//! # Purpose
//!
//! These tests run the real poll loop on the tokio runtime against the
//! scripted `MockUsbTransport`, and observe it only through the public API:
//! the event subscriptions and the `sequence_number` / `file_offset`
//! accessors.  They verify:
//!
//! - The happy path: the first command asks for offset 0 with sequence 1,
//!   and a one-record response yields one stroke and advances both counters.
//! - The diagnostics: sequence mismatches, short packets and no-data
//!   responses each produce exactly one event and never a stroke.
//! - The lifecycle: start/stop idempotence, flush, and close.
//!
//! # Exchange under test
//!
//! ```text
//! Host                                   Machine (mock)
//! ────                                   ──────────────
//! ReadBytes seq=1 offset=0 count=512 →
//!                                      ← seq=1 len=8  [08 00 00 00 | 00 00 00 00]
//! stroke "S", offset=8, seq=2
//! ReadBytes seq=2 offset=8 count=512 →
//!                                      ← seq=2 len=0  (no data)
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use steno_device::application::stroke_poller::PollerConfig;
use steno_device::infrastructure::usb::mock::{response_frame, MockReply, MockUsbTransport};
use steno_device::{DeviceConfig, DeviceError, SequenceMismatch, SessionState, StenoDevice};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn fast_config() -> DeviceConfig {
    DeviceConfig {
        poller: PollerConfig {
            poll_delay: Duration::from_millis(5),
            flush_check_interval: Duration::from_millis(50),
        },
        ..DeviceConfig::default()
    }
}

fn device_with(replies: Vec<MockReply>) -> (StenoDevice, Arc<MockUsbTransport>) {
    let transport = Arc::new(MockUsbTransport::with_replies(replies));
    let device = StenoDevice::with_transport(transport.clone(), fast_config());
    (device, transport)
}

/// Polls `condition` every few milliseconds for up to two seconds.
async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

// ── End to end ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_first_exchange_yields_one_stroke_and_advances_counters() {
    // Arrange
    let (device, transport) = device_with(vec![MockReply::Strokes(vec![[0x08, 0, 0, 0]])]);
    let strokes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&strokes);
    device
        .events()
        .subscribe_stroke(move |s| sink.lock().unwrap().push(s.steno().to_string()));

    // Act
    device.start().expect("start");
    let got_stroke = wait_until(|| !strokes.lock().unwrap().is_empty()).await;
    let second_sent = wait_until(|| transport.written_headers().len() >= 2).await;
    device.close().await;

    // Assert
    assert!(got_stroke, "a stroke must be published");
    assert!(second_sent, "polling continues after the first response");
    assert_eq!(*strokes.lock().unwrap(), vec!["S"]);

    let headers = transport.written_headers();
    assert_eq!(headers[0].sequence_number, 1);
    assert_eq!(headers[0].params.file_offset, 0);
    assert_eq!(headers[0].params.byte_count, 512);
    // The follow-up command carries the advanced state.
    assert_eq!(headers[1].sequence_number, 2);
    assert_eq!(headers[1].params.file_offset, 8);
}

#[tokio::test]
async fn test_counters_after_n_responses() {
    // Arrange – payloads of 8, 16 and 24 bytes, then the machine stays empty
    let (device, _) = device_with(vec![
        MockReply::Strokes(vec![[0x08, 0, 0, 0]]),
        MockReply::Strokes(vec![[0x04, 0, 0, 0]; 2]),
        MockReply::Strokes(vec![[0x02, 0, 0, 0]; 3]),
    ]);
    let strokes = counter();
    let c = Arc::clone(&strokes);
    device.events().subscribe_stroke(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });

    // Act
    device.start().expect("start");
    assert!(wait_until(|| strokes.load(Ordering::SeqCst) == 6).await);
    device.stop().expect("stop");

    // Assert – the loop may have had further no-data exchanges, which
    // advance the sequence but never the offset
    assert_eq!(device.file_offset().await.unwrap(), 48);
    assert!(device.sequence_number().await.unwrap() >= 4);
    device.close().await;
}

// ── Diagnostics ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sequence_mismatch_emits_one_diagnostic_and_no_stroke() {
    // Arrange – the machine answers with a stale sequence number once
    let stale = response_frame(9, &[0x08, 0, 0, 0, 0, 0, 0, 0]);
    let (device, _) = device_with(vec![MockReply::Raw(stale)]);
    let mismatches = Arc::new(Mutex::new(Vec::new()));
    let strokes = counter();
    let m = Arc::clone(&mismatches);
    let s = Arc::clone(&strokes);
    device
        .events()
        .subscribe_incorrect_sequence_number(move |x| m.lock().unwrap().push(*x));
    device.events().subscribe_stroke(move |_| {
        s.fetch_add(1, Ordering::SeqCst);
    });

    // Act
    device.start().expect("start");
    assert!(wait_until(|| !mismatches.lock().unwrap().is_empty()).await);
    tokio::time::sleep(Duration::from_millis(30)).await;
    device.stop().expect("stop");

    // Assert
    assert_eq!(
        *mismatches.lock().unwrap(),
        vec![SequenceMismatch {
            expected: 1,
            received: 9
        }]
    );
    assert_eq!(strokes.load(Ordering::SeqCst), 0);
    assert_eq!(device.file_offset().await.unwrap(), 0);
    device.close().await;
}

#[tokio::test]
async fn test_no_data_emits_diagnostic_and_keeps_offset() {
    // Arrange
    let (device, _) = device_with(vec![MockReply::NoData]);
    let no_data = counter();
    let n = Arc::clone(&no_data);
    device.events().subscribe_no_data(move || {
        n.fetch_add(1, Ordering::SeqCst);
    });

    // Act
    device.start().expect("start");
    assert!(wait_until(|| no_data.load(Ordering::SeqCst) >= 1).await);
    device.stop().expect("stop");

    // Assert
    assert_eq!(device.file_offset().await.unwrap(), 0);
    device.close().await;
}

#[tokio::test]
async fn test_single_no_data_response_emits_exactly_one_diagnostic() {
    // Arrange – one no-data response, after which every read fails
    let mut replies = vec![MockReply::NoData];
    let stall = MockReply::Fail(steno_device::TransferError::Stall);
    replies.extend(std::iter::repeat(stall).take(1000));
    let (device, _) = device_with(replies);
    let no_data = counter();
    let errors = counter();
    let n = Arc::clone(&no_data);
    let e = Arc::clone(&errors);
    device.events().subscribe_no_data(move || {
        n.fetch_add(1, Ordering::SeqCst);
    });
    device.events().subscribe_transport_error(move |_| {
        e.fetch_add(1, Ordering::SeqCst);
    });

    // Act
    device.start().expect("start");
    assert!(wait_until(|| errors.load(Ordering::SeqCst) >= 3).await);
    device.stop().expect("stop");

    // Assert
    assert_eq!(no_data.load(Ordering::SeqCst), 1);
    device.close().await;
}

#[tokio::test]
async fn test_short_packet_reports_bytes_received() {
    // Arrange – payload declared as 16 bytes, only 8 delivered
    let mut frame = response_frame(1, &[0u8; 16]);
    frame.truncate(40);
    let (device, _) = device_with(vec![MockReply::Raw(frame)]);
    let sizes = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&sizes);
    device
        .events()
        .subscribe_incorrect_byte_count(move |n| s.lock().unwrap().push(*n));

    // Act
    device.start().expect("start");
    assert!(wait_until(|| !sizes.lock().unwrap().is_empty()).await);
    device.stop().expect("stop");

    // Assert
    assert_eq!(sizes.lock().unwrap()[0], 40);
    assert_eq!(device.file_offset().await.unwrap(), 0);
    device.close().await;
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_start_twice_and_stop_twice_are_idempotent() {
    // Arrange – one cycle per 50 ms: a single loop sends at most five
    // commands in 200 ms
    let transport = Arc::new(MockUsbTransport::new());
    let config = DeviceConfig {
        poller: PollerConfig {
            poll_delay: Duration::from_millis(50),
            flush_check_interval: Duration::from_millis(50),
        },
        ..DeviceConfig::default()
    };
    let device = StenoDevice::with_transport(transport.clone(), config);

    // Act
    device.start().expect("first start");
    device.start().expect("second start is a no-op");
    assert_eq!(device.state(), SessionState::Reading);
    tokio::time::sleep(Duration::from_millis(200)).await;

    device.stop().expect("first stop");
    device.stop().expect("second stop is a no-op");

    // Assert
    assert_eq!(device.state(), SessionState::Open);
    let commands = transport.written().len();
    assert!(
        (1..=6).contains(&commands),
        "one loop drives the transport, saw {commands} commands"
    );

    device.close().await;
}

#[tokio::test]
async fn test_flush_drains_without_publishing_strokes() {
    // Arrange – two buffered strokes, then the machine is empty
    let (device, transport) = device_with(vec![
        MockReply::Strokes(vec![[0x08, 0, 0, 0]]),
        MockReply::Strokes(vec![[0x04, 0, 0, 0]]),
    ]);
    let strokes = counter();
    let c = Arc::clone(&strokes);
    device.events().subscribe_stroke(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });

    // Act
    tokio::time::timeout(Duration::from_secs(2), device.flush())
        .await
        .expect("flush must finish once the machine reports no data")
        .expect("flush");

    // Assert
    assert_eq!(strokes.load(Ordering::SeqCst), 0);
    assert_eq!(device.file_offset().await.unwrap(), 16);
    assert_eq!(device.state(), SessionState::Open);
    assert_eq!(transport.remaining_replies(), 0);

    // Reading afterwards publishes new strokes again
    transport.push_reply(MockReply::Strokes(vec![[0x02, 0, 0, 0]]));
    device.start().expect("start");
    assert!(wait_until(|| strokes.load(Ordering::SeqCst) == 1).await);
    device.close().await;
}

#[tokio::test]
async fn test_close_is_idempotent_and_rejects_later_commands() {
    // Arrange
    let (device, transport) = device_with(vec![]);
    device.start().expect("start");

    // Act
    device.close().await;
    device.close().await;

    // Assert
    assert_eq!(device.state(), SessionState::Closed);
    assert_eq!(transport.release_count(), 1);
    assert!(matches!(device.start(), Err(DeviceError::Closed)));
    assert!(matches!(device.flush().await, Err(DeviceError::Closed)));
}

#[tokio::test]
async fn test_no_strokes_after_close() {
    // Arrange – an endless supply of strokes
    let replies = vec![MockReply::Strokes(vec![[0x08, 0, 0, 0]]); 1000];
    let (device, _) = device_with(replies);
    let strokes = counter();
    let c = Arc::clone(&strokes);
    device.events().subscribe_stroke(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    device.start().expect("start");
    assert!(wait_until(|| strokes.load(Ordering::SeqCst) >= 2).await);

    // Act
    device.close().await;
    let at_close = strokes.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Assert
    assert_eq!(strokes.load(Ordering::SeqCst), at_close);
}
