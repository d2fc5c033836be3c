//! USB infrastructure: finding the machine and moving bytes to and from it.
//!
//! # How a steno machine shows up on USB (for beginners)
//!
//! The machine enumerates as a vendor-specific device with one interface and
//! two bulk endpoints: `0x02` (host to device) carries commands and `0x81`
//! (device to host) carries responses.  Opening it means:
//!
//! 1. walking the list of attached devices and picking the one whose vendor
//!    id, product id and product name match [`STENO_MACHINE`];
//! 2. selecting configuration 1;
//! 3. claiming interface 0 so no other process can talk to it;
//! 4. creating a transfer queue on each bulk endpoint.
//!
//! No matching device is not an error: [`StenoDevice::open`] returns
//! `Ok(None)` so callers can tell "nothing plugged in" from "could not open".

pub mod mock;
pub mod nusb_transport;

use std::sync::Arc;

use thiserror::Error;

use crate::application::steno_device::{DeviceConfig, StenoDevice};

pub use nusb_transport::NusbTransport;

/// Bulk IN endpoint carrying responses.
pub const ENDPOINT_IN: u8 = 0x81;
/// Bulk OUT endpoint carrying commands.
pub const ENDPOINT_OUT: u8 = 0x02;
/// Configuration value selected before claiming.
pub const CONFIGURATION: u8 = 1;
/// Interface number claimed for the session.
pub const INTERFACE: u8 = 0;

/// What a device must report to be treated as a steno machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub product_name: &'static str,
}

/// The Stentura-protocol writer.
pub const STENO_MACHINE: DeviceIdentity = DeviceIdentity {
    vendor_id: 0x112B,
    product_id: 0x000D,
    product_name: "Steno Machine",
};

impl DeviceIdentity {
    /// `true` if the reported descriptor values identify this device.
    pub fn matches(&self, vendor_id: u16, product_id: u16, product_name: Option<&str>) -> bool {
        vendor_id == self.vendor_id
            && product_id == self.product_id
            && product_name == Some(self.product_name)
    }
}

/// Errors while opening the machine.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The OS refused to list USB devices.
    #[error("failed to enumerate USB devices: {0}")]
    Enumerate(#[source] std::io::Error),

    /// The device was found but could not be opened.
    #[error("failed to open the steno machine: {0}")]
    Open(#[source] std::io::Error),

    /// Interface 0 could not be claimed (usually held by another process or
    /// a kernel driver).
    #[error("failed to claim interface 0: {0}")]
    Claim(#[source] std::io::Error),
}

impl StenoDevice {
    /// Finds and opens the first attached steno machine.
    ///
    /// Returns `Ok(None)` when no machine is attached.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the machine is present but cannot be
    /// opened or claimed.
    pub fn open(config: DeviceConfig) -> Result<Option<Self>, TransportError> {
        let Some(transport) = NusbTransport::open(&STENO_MACHINE)? else {
            return Ok(None);
        };
        Ok(Some(Self::with_transport(Arc::new(transport), config)))
    }
}
