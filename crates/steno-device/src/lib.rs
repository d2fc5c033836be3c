//! steno-device library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does steno-device do? (for beginners)
//!
//! A Stentura-style steno machine keeps the strokes the writer presses in
//! an internal buffer.  This crate opens the machine over USB and keeps
//! pulling that buffer:
//!
//! 1. Finds the machine by vendor/product id and product name, claims its
//!    interface and opens the two bulk endpoints.
//! 2. Sends a read-bytes command carrying a sequence number and the offset
//!    of the next unread byte.
//! 3. Validates the response and decodes each stroke record into steno text
//!    with `steno_core`.
//! 4. Publishes strokes and protocol diagnostics to subscribers.
//!
//! ```ignore
//! let device = StenoDevice::open(DeviceConfig::default())?.expect("no machine attached");
//! device.events().subscribe_stroke(|s| println!("{s}"));
//! device.start()?;
//! ```

/// Application layer: protocol engine, poll loop and device façade.
pub mod application;

/// Infrastructure layer: USB transport and configuration storage.
pub mod infrastructure;

pub use application::events::{EventHub, SubscriptionId};
pub use application::protocol_engine::{Response, SequenceMismatch};
pub use application::steno_device::{DeviceConfig, DeviceError, SessionState, StenoDevice};
pub use application::transport::{TransferError, TransferTiming, UsbTransport};
