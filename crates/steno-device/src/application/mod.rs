//! Application layer: the steno session logic, independent of any USB stack.
//!
//! # What lives here? (for beginners)
//!
//! - **`transport`** – The [`transport::UsbTransport`] trait: two bulk
//!   endpoints with a timeout and cancellation discipline.  Everything above
//!   it is testable without hardware.
//!
//! - **`protocol_engine`** – One read-bytes exchange at a time: builds the
//!   command, validates the response, and tracks the sequence number and the
//!   file offset.
//!
//! - **`events`** – The callback registry the poll loop publishes to.
//!
//! - **`stroke_poller`** – The background task that polls the machine and
//!   turns responses into events, plus the flush operation.
//!
//! - **`steno_device`** – The façade consumers hold: start, stop, flush,
//!   close.

pub mod events;
pub mod protocol_engine;
pub mod steno_device;
pub mod stroke_poller;
pub mod transport;
