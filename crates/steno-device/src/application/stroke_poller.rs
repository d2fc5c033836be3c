//! StrokePoller: the background loop that keeps asking the machine for
//! strokes.
//!
//! # How the loop works (for beginners)
//!
//! The machine never pushes data on its own.  The host has to ask for it,
//! so the poller runs one tokio task that repeats:
//!
//! 1. send a read-bytes command;
//! 2. read the response and turn it into events (strokes, or a diagnostic);
//! 3. sleep for the poll delay.
//!
//! Stopping the loop cancels a [`CancellationToken`].  Every transfer is
//! handed the same token, so a transfer that is in flight when the loop is
//! stopped is cancelled right away instead of running into its timeout.
//!
//! # Exactly one loop
//!
//! The active loop lives in a `Mutex<Option<ActiveLoop>>` slot, set once per
//! start and cleared once per stop.  `stop()` does not wait for the task: the
//! engine sits behind an async mutex, so a loop that is still finishing its
//! last transfer and a freshly started one can never talk to the machine at
//! the same time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::EventHub;
use super::protocol_engine::{ProtocolEngine, Response};
use super::transport::TransferError;

/// Delay between two poll cycles.
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_millis(100);

/// How often `flush` re-checks that reading is still active.
pub const DEFAULT_FLUSH_CHECK_INTERVAL: Duration = Duration::from_millis(1000);

/// Timing of the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub poll_delay: Duration,
    pub flush_check_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_delay: DEFAULT_POLL_DELAY,
            flush_check_interval: DEFAULT_FLUSH_CHECK_INTERVAL,
        }
    }
}

struct ActiveLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the poll task of one session.
pub struct StrokePoller {
    engine: Arc<tokio::sync::Mutex<ProtocolEngine>>,
    events: Arc<EventHub>,
    config: PollerConfig,
    active: Mutex<Option<ActiveLoop>>,
    discard_strokes: Arc<AtomicBool>,
}

impl StrokePoller {
    pub fn new(
        engine: Arc<tokio::sync::Mutex<ProtocolEngine>>,
        events: Arc<EventHub>,
        config: PollerConfig,
    ) -> Self {
        Self {
            engine,
            events,
            config,
            active: Mutex::new(None),
            discard_strokes: Arc::new(AtomicBool::new(false)),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<ActiveLoop>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts the poll loop on the current tokio runtime.
    ///
    /// Returns `Ok(false)` if a loop is already active.
    ///
    /// # Errors
    ///
    /// Returns [`TryCurrentError`] when called outside a tokio runtime.
    pub fn start(&self) -> Result<bool, TryCurrentError> {
        let mut slot = self.slot();
        if slot.is_some() {
            return Ok(false);
        }

        let runtime = Handle::try_current()?;
        let cancel = CancellationToken::new();
        let handle = runtime.spawn(run_loop(
            Arc::clone(&self.engine),
            Arc::clone(&self.events),
            self.config.poll_delay,
            cancel.clone(),
            Arc::clone(&self.discard_strokes),
        ));
        *slot = Some(ActiveLoop { cancel, handle });
        info!("stroke polling started");
        Ok(true)
    }

    /// Cancels the active loop without waiting for it.
    ///
    /// Returns `false` if no loop was active.
    pub fn stop(&self) -> bool {
        match self.take_active() {
            Some(active) => {
                active.cancel.cancel();
                info!("stroke polling stopped");
                true
            }
            None => false,
        }
    }

    /// Cancels the active loop and hands back its task so the caller can
    /// wait for the last transfer to finish.
    pub(crate) fn shutdown(&self) -> Option<JoinHandle<()>> {
        self.take_active().map(|active| {
            active.cancel.cancel();
            active.handle
        })
    }

    fn take_active(&self) -> Option<ActiveLoop> {
        self.slot().take()
    }

    /// `true` while a loop is active.
    pub fn is_active(&self) -> bool {
        self.slot().is_some()
    }

    fn active_token(&self) -> Option<CancellationToken> {
        self.slot().as_ref().map(|active| active.cancel.clone())
    }

    /// Drains the strokes the machine buffered while nobody was reading.
    ///
    /// Starts reading if needed and waits until the machine reports no data
    /// or a transfer fails, re-checking at the flush interval that reading
    /// was not stopped elsewhere.  Strokes read while flushing are discarded.
    /// Reading is stopped afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`TryCurrentError`] when called outside a tokio runtime.
    pub async fn flush(&self) -> Result<(), TryCurrentError> {
        let drained = Arc::new(Notify::new());
        let on_error = {
            let drained = Arc::clone(&drained);
            self.events
                .subscribe_transport_error(move |_| drained.notify_one())
        };
        let on_no_data = {
            let drained = Arc::clone(&drained);
            self.events.subscribe_no_data(move || drained.notify_one())
        };
        self.discard_strokes.store(true, Ordering::SeqCst);
        debug!("flush started");

        let result = self.start().map(|_| ());
        if result.is_ok() {
            while let Some(cancel) = self.active_token() {
                tokio::select! {
                    _ = drained.notified() => break,
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.config.flush_check_interval) => {}
                }
            }
        }

        self.events.unsubscribe(on_error);
        self.events.unsubscribe(on_no_data);
        // The last cycle may still be publishing; strokes stay discarded
        // until the task has finished.
        if let Some(handle) = self.shutdown() {
            info!("stroke polling stopped");
            if let Err(e) = handle.await {
                warn!("poll loop ended abnormally: {e}");
            }
        }
        self.discard_strokes.store(false, Ordering::SeqCst);
        debug!("flush finished");
        result
    }
}

impl Drop for StrokePoller {
    fn drop(&mut self) {
        if let Some(active) = self.take_active() {
            active.cancel.cancel();
        }
    }
}

enum Cycle {
    WriteFailed(TransferError),
    Response(Response),
}

async fn run_loop(
    engine: Arc<tokio::sync::Mutex<ProtocolEngine>>,
    events: Arc<EventHub>,
    poll_delay: Duration,
    cancel: CancellationToken,
    discard_strokes: Arc<AtomicBool>,
) {
    debug!("poll loop running");
    while !cancel.is_cancelled() {
        let cycle = {
            let mut engine = engine.lock().await;
            if cancel.is_cancelled() {
                break;
            }
            match engine.send_read_command(&cancel).await {
                Err(e) => Cycle::WriteFailed(e),
                Ok(_) => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    Cycle::Response(engine.receive_response(&cancel).await)
                }
            }
        };

        publish(cycle, &events, &cancel, &discard_strokes);

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(poll_delay) => {}
        }
    }
    debug!("poll loop exited");
}

fn publish(
    cycle: Cycle,
    events: &EventHub,
    cancel: &CancellationToken,
    discard_strokes: &AtomicBool,
) {
    let response = match cycle {
        Cycle::WriteFailed(e) => {
            publish_transfer_error(&e, events, cancel);
            return;
        }
        Cycle::Response(response) => response,
    };

    match response {
        Response::Strokes(strokes) => {
            if discard_strokes.load(Ordering::SeqCst) {
                debug!(count = strokes.len(), "discarding flushed strokes");
                return;
            }
            for stroke in &strokes {
                events.emit_stroke(stroke);
            }
        }
        Response::Empty => {}
        Response::SequenceMismatch(mismatch) => events.emit_incorrect_sequence_number(&mismatch),
        Response::ShortPacket { received } => events.emit_incorrect_byte_count(received),
        Response::NoData => events.emit_no_data(),
        Response::Failed(e) => publish_transfer_error(&e, events, cancel),
    }
}

fn publish_transfer_error(error: &TransferError, events: &EventHub, cancel: &CancellationToken) {
    // A transfer we cancelled ourselves on shutdown is not an error.
    if cancel.is_cancelled() && *error == TransferError::Cancelled {
        return;
    }
    warn!("transfer failed: {error}");
    events.emit_transport_error(error);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
