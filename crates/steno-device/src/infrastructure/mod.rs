//! Infrastructure layer for the steno device.
//!
//! Contains the OS-facing adapters: the USB transport and the configuration
//! file.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `steno_core`, but MUST NOT be imported by the `application` layer outside
//! of tests.
//!
//! # Sub-modules
//!
//! - **`usb`** – `nusb`-backed implementation of `UsbTransport`, device
//!   discovery, and a scripted `MockUsbTransport` for tests and demos.
//!
//! - **`storage`** – TOML configuration persisted in the platform config
//!   directory.

pub mod storage;
pub mod usb;
