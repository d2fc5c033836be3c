//! `UsbTransport` backed by the `nusb` crate.
//!
//! Each bulk endpoint gets one `nusb` transfer queue.  A transfer is
//! submitted to its queue and awaited with two limits: if it has not
//! completed after the cooperative wait, or the caller's token fires, the
//! queue is cancelled and the transfer's terminal state is collected within
//! whatever is left of the hard timeout.
//!
//! A transfer that outlives even the hard timeout stays queued, and `nusb`
//! completes a queue's transfers in submission order.  Before each new
//! submission any such leftovers are cancelled and their completions
//! discarded, so a read never returns the frame of an earlier request.

use async_trait::async_trait;
use nusb::transfer::{Queue, RequestBuffer, TransferError as NusbTransferError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{DeviceIdentity, TransportError, CONFIGURATION, ENDPOINT_IN, ENDPOINT_OUT, INTERFACE};
use crate::application::transport::{Completion, TransferError, TransferTiming, UsbTransport};

struct Endpoints {
    // Queues first: they must be dropped before the interface and device.
    out: Queue<Vec<u8>>,
    inp: Queue<RequestBuffer>,
    _interface: nusb::Interface,
    _device: nusb::Device,
}

/// A claimed steno machine.
pub struct NusbTransport {
    endpoints: Mutex<Option<Endpoints>>,
}

impl NusbTransport {
    /// Opens the first attached device matching `identity`.
    ///
    /// Returns `Ok(None)` when no such device is attached.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if enumeration, opening or claiming fails.
    pub fn open(identity: &DeviceIdentity) -> Result<Option<Self>, TransportError> {
        let found = nusb::list_devices()
            .map_err(TransportError::Enumerate)?
            .find(|info| {
                identity.matches(info.vendor_id(), info.product_id(), info.product_string())
            });
        let Some(info) = found else {
            debug!(
                vendor_id = identity.vendor_id,
                product_id = identity.product_id,
                "no steno machine attached"
            );
            return Ok(None);
        };

        let device = info.open().map_err(TransportError::Open)?;
        // Most platforms already selected configuration 1; failing here is
        // only fatal if the claim below fails too.
        if let Err(e) = device.set_configuration(CONFIGURATION) {
            warn!("could not select configuration {CONFIGURATION}: {e}");
        }
        let interface = device
            .claim_interface(INTERFACE)
            .map_err(TransportError::Claim)?;

        let endpoints = Endpoints {
            out: interface.bulk_out_queue(ENDPOINT_OUT),
            inp: interface.bulk_in_queue(ENDPOINT_IN),
            _interface: interface,
            _device: device,
        };
        info!(
            bus = info.bus_number(),
            address = info.device_address(),
            "steno machine opened"
        );
        Ok(Some(Self {
            endpoints: Mutex::new(Some(endpoints)),
        }))
    }
}

/// A transfer queue whose leftover transfers can be cancelled and reaped.
#[async_trait]
trait StaleTransfers: Send {
    fn pending(&self) -> usize;
    fn cancel_all(&mut self);
    /// Waits for the oldest pending transfer and drops its completion.
    async fn discard_completion(&mut self);
}

#[async_trait]
impl StaleTransfers for Queue<Vec<u8>> {
    fn pending(&self) -> usize {
        Queue::pending(self)
    }

    fn cancel_all(&mut self) {
        Queue::cancel_all(self);
    }

    async fn discard_completion(&mut self) {
        let _ = self.next_complete().await;
    }
}

#[async_trait]
impl StaleTransfers for Queue<RequestBuffer> {
    fn pending(&self) -> usize {
        Queue::pending(self)
    }

    fn cancel_all(&mut self) {
        Queue::cancel_all(self);
    }

    async fn discard_completion(&mut self) {
        let _ = self.next_complete().await;
    }
}

/// Cancels and reaps every transfer still pending on `queue`.
///
/// Returns `false` if a leftover did not complete before `deadline`; the
/// queue is then still out of step and nothing new may be submitted.
async fn drain_stale<Q: StaleTransfers + ?Sized>(queue: &mut Q, deadline: Instant) -> bool {
    let stale = queue.pending();
    if stale == 0 {
        return true;
    }
    warn!(stale, "discarding transfers left over from a timed-out request");
    while queue.pending() > 0 {
        queue.cancel_all();
        if tokio::time::timeout_at(deadline, queue.discard_completion())
            .await
            .is_err()
        {
            return false;
        }
    }
    true
}

/// Submits `$request` on `$queue` and waits for it under `$timing`, cancelling
/// on the cooperative wait or on `$cancel`.  Evaluates to `None` if the
/// transfer did not finish within the hard timeout, or if leftovers of an
/// earlier timed-out transfer could not be reaped first.
///
/// A macro because the queue's request trait is not nameable from outside
/// `nusb`.
macro_rules! bounded_transfer {
    ($queue:expr, $request:expr, $timing:expr, $cancel:expr) => {{
        let timing: TransferTiming = $timing;
        let started = Instant::now();
        let deadline = started + timing.transfer_timeout;
        let wait_until = (started + timing.wait).min(deadline);

        if !drain_stale(&mut $queue, deadline).await {
            None
        } else {
            $queue.submit($request);
            let early = tokio::select! {
                completion = $queue.next_complete() => Some(completion),
                _ = tokio::time::sleep_until(wait_until) => None,
                _ = $cancel.cancelled() => None,
            };
            match early {
                Some(completion) => Some(completion),
                None => {
                    $queue.cancel_all();
                    tokio::time::timeout_at(deadline, $queue.next_complete())
                        .await
                        .ok()
                }
            }
        }
    }};
}

fn map_status(status: Result<(), NusbTransferError>) -> Result<(), TransferError> {
    status.map_err(|e| match e {
        NusbTransferError::Cancelled => TransferError::Cancelled,
        NusbTransferError::Stall => TransferError::Stall,
        NusbTransferError::Disconnected => TransferError::Disconnected,
        NusbTransferError::Fault => TransferError::Fault,
        _ => TransferError::Unknown,
    })
}

#[async_trait]
impl UsbTransport for NusbTransport {
    async fn bulk_out(
        &self,
        data: Vec<u8>,
        timing: TransferTiming,
        cancel: &CancellationToken,
    ) -> Completion<usize> {
        let mut guard = self.endpoints.lock().await;
        let Some(endpoints) = guard.as_mut() else {
            return Completion::failed(0, TransferError::Released);
        };

        match bounded_transfer!(endpoints.out, data, timing, cancel) {
            Some(c) => Completion {
                data: c.data.actual_length(),
                status: map_status(c.status),
            },
            None => Completion::failed(0, TransferError::TimedOut),
        }
    }

    async fn bulk_in(
        &self,
        capacity: usize,
        timing: TransferTiming,
        cancel: &CancellationToken,
    ) -> Completion<Vec<u8>> {
        let mut guard = self.endpoints.lock().await;
        let Some(endpoints) = guard.as_mut() else {
            return Completion::failed(Vec::new(), TransferError::Released);
        };

        match bounded_transfer!(endpoints.inp, RequestBuffer::new(capacity), timing, cancel) {
            Some(c) => Completion {
                data: c.data,
                status: map_status(c.status),
            },
            None => Completion::failed(Vec::new(), TransferError::TimedOut),
        }
    }

    async fn release(&self) {
        let Some(mut endpoints) = self.endpoints.lock().await.take() else {
            return;
        };
        endpoints.out.cancel_all();
        endpoints.inp.cancel_all();
        drop(endpoints);
        info!("steno machine released");
    }
}
