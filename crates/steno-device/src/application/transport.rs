//! The USB transport seam used by the protocol engine.
//!
//! The engine only needs two bulk endpoints and a way to let go of them.
//! [`UsbTransport`] abstracts exactly that so the protocol logic can be
//! tested against a scripted transport; the `nusb`-backed implementation and
//! the mock live in the infrastructure layer.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Hard limit on a single transfer, from submission to terminal state.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_millis(2000);

/// How long a transfer may run before it is actively cancelled.
pub const DEFAULT_TRANSFER_WAIT: Duration = Duration::from_millis(100);

/// Terminal error of a single bulk transfer.
///
/// None of these end the poll loop; they are published to subscribers and
/// the next poll iteration tries again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The transfer could not be submitted at all.
    #[error("transfer submission failed: {0}")]
    Submit(String),
    /// The transfer was cancelled before it completed.
    #[error("transfer cancelled")]
    Cancelled,
    /// The transfer did not reach a terminal state within the hard timeout.
    #[error("transfer timed out")]
    TimedOut,
    /// The endpoint returned a STALL handshake.
    #[error("endpoint stalled")]
    Stall,
    /// The device was unplugged.
    #[error("device disconnected")]
    Disconnected,
    /// Low-level bus or host controller fault.
    #[error("transfer fault")]
    Fault,
    /// The transport has already been released.
    #[error("transport released")]
    Released,
    /// Any other failure reported by the OS.
    #[error("unknown transfer error")]
    Unknown,
}

/// Result of one bulk transfer: the data moved plus its terminal status.
///
/// A failed transfer may still carry data (e.g. a read cancelled after part
/// of a frame arrived), so the two are reported side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion<T> {
    pub data: T,
    pub status: Result<(), TransferError>,
}

impl<T> Completion<T> {
    /// A completion that moved `data` successfully.
    pub fn ok(data: T) -> Self {
        Self {
            data,
            status: Ok(()),
        }
    }

    /// A completion that failed with `error` after moving `data`.
    pub fn failed(data: T, error: TransferError) -> Self {
        Self {
            data,
            status: Err(error),
        }
    }
}

/// The two timeouts that bound every transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferTiming {
    /// Hard limit enforced by the transport.
    pub transfer_timeout: Duration,
    /// Cooperative wait after which the transfer is cancelled.
    pub wait: Duration,
}

impl Default for TransferTiming {
    fn default() -> Self {
        Self {
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
            wait: DEFAULT_TRANSFER_WAIT,
        }
    }
}

/// Bulk-endpoint access to one claimed steno machine.
///
/// Implementations must honour the timing discipline: if a transfer has not
/// completed within `timing.wait`, or `cancel` fires, the transfer is
/// cancelled explicitly and its terminal state collected, never waiting
/// longer than `timing.transfer_timeout` overall.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsbTransport: Send + Sync {
    /// Writes `data` to the OUT endpoint; completes with the bytes written.
    async fn bulk_out(
        &self,
        data: Vec<u8>,
        timing: TransferTiming,
        cancel: &CancellationToken,
    ) -> Completion<usize>;

    /// Reads up to `capacity` bytes from the IN endpoint.
    async fn bulk_in(
        &self,
        capacity: usize,
        timing: TransferTiming,
        cancel: &CancellationToken,
    ) -> Completion<Vec<u8>>;

    /// Cancels pending transfers and releases the interface and device
    /// handle.  Idempotent; transfers afterwards fail with
    /// [`TransferError::Released`].
    async fn release(&self);
}
