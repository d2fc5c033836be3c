//! StenoDevice: the public face of one open steno machine.
//!
//! Ties a [`UsbTransport`], the [`ProtocolEngine`] and the [`StrokePoller`]
//! together behind a small command surface: start, stop, flush and close.
//! Consumers observe the machine through [`StenoDevice::events`].
//!
//! Opening real hardware lives in the infrastructure layer
//! (`StenoDevice::open`); tests and demos build a device around any
//! transport with [`StenoDevice::with_transport`].

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::runtime::TryCurrentError;
use tracing::{debug, info, warn};

use super::events::EventHub;
use super::protocol_engine::{EngineConfig, ProtocolEngine};
use super::stroke_poller::{PollerConfig, StrokePoller};
use super::transport::UsbTransport;

/// Errors returned by [`StenoDevice`] commands.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device has been closed; only `close` is still accepted.
    #[error("device is closed")]
    Closed,

    /// The command needs a tokio runtime and none is running.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] TryCurrentError),
}

/// Lifecycle state of a [`StenoDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// `close` has run; every command except `close` fails.
    Closed,
    /// The interface is claimed and no poll loop is running.
    Open,
    /// A poll loop is active.
    Reading,
}

/// Runtime settings of one device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceConfig {
    pub engine: EngineConfig,
    pub poller: PollerConfig,
}

struct Session {
    transport: Arc<dyn UsbTransport>,
    engine: Arc<tokio::sync::Mutex<ProtocolEngine>>,
    poller: Arc<StrokePoller>,
}

/// One open steno machine.
pub struct StenoDevice {
    session: Mutex<Option<Session>>,
    events: Arc<EventHub>,
}

impl StenoDevice {
    /// Builds a device around an already opened transport.
    pub fn with_transport(transport: Arc<dyn UsbTransport>, config: DeviceConfig) -> Self {
        let events = Arc::new(EventHub::new());
        let engine = Arc::new(tokio::sync::Mutex::new(ProtocolEngine::new(
            Arc::clone(&transport),
            config.engine,
        )));
        let poller = Arc::new(StrokePoller::new(
            Arc::clone(&engine),
            Arc::clone(&events),
            config.poller,
        ));

        Self {
            session: Mutex::new(Some(Session {
                transport,
                engine,
                poller,
            })),
            events,
        }
    }

    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn poller(&self) -> Result<Arc<StrokePoller>, DeviceError> {
        self.session()
            .as_ref()
            .map(|s| Arc::clone(&s.poller))
            .ok_or(DeviceError::Closed)
    }

    fn engine(&self) -> Result<Arc<tokio::sync::Mutex<ProtocolEngine>>, DeviceError> {
        self.session()
            .as_ref()
            .map(|s| Arc::clone(&s.engine))
            .ok_or(DeviceError::Closed)
    }

    /// Subscription points for strokes and diagnostics.
    ///
    /// Subscriptions survive `close`; they simply stop firing.
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub fn state(&self) -> SessionState {
        match self.session().as_ref() {
            None => SessionState::Closed,
            Some(s) if s.poller.is_active() => SessionState::Reading,
            Some(_) => SessionState::Open,
        }
    }

    /// Starts the poll loop.  Does nothing if it is already running.
    ///
    /// # Errors
    ///
    /// [`DeviceError::Closed`] after close, [`DeviceError::NoRuntime`]
    /// outside a tokio runtime.
    pub fn start(&self) -> Result<(), DeviceError> {
        self.poller()?.start()?;
        Ok(())
    }

    /// Stops the poll loop.  Does nothing if it is not running.
    ///
    /// # Errors
    ///
    /// [`DeviceError::Closed`] after close.
    pub fn stop(&self) -> Result<(), DeviceError> {
        self.poller()?.stop();
        Ok(())
    }

    /// Reads and discards everything the machine buffered, then stops
    /// reading.
    ///
    /// # Errors
    ///
    /// [`DeviceError::Closed`] after close, [`DeviceError::NoRuntime`]
    /// outside a tokio runtime.
    pub async fn flush(&self) -> Result<(), DeviceError> {
        let poller = self.poller()?;
        poller.flush().await?;
        Ok(())
    }

    /// Stops reading, waits for the last transfer and releases the machine.
    ///
    /// Safe to call more than once.
    pub async fn close(&self) {
        let Some(session) = self.session().take() else {
            debug!("close on an already closed device");
            return;
        };

        if let Some(handle) = session.poller.shutdown() {
            if let Err(e) = handle.await {
                warn!("poll task ended abnormally: {e}");
            }
        }
        session.transport.release().await;
        info!("steno machine closed");
    }

    /// Sequence number of the next command.
    ///
    /// # Errors
    ///
    /// [`DeviceError::Closed`] after close.
    pub async fn sequence_number(&self) -> Result<u32, DeviceError> {
        let engine = self.engine()?;
        let n = engine.lock().await.sequence_number();
        Ok(n)
    }

    /// Bytes of stroke data consumed so far.
    ///
    /// # Errors
    ///
    /// [`DeviceError::Closed`] after close.
    pub async fn file_offset(&self) -> Result<u64, DeviceError> {
        let engine = self.engine()?;
        let offset = engine.lock().await.file_offset();
        Ok(offset)
    }
}

impl std::fmt::Debug for StenoDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StenoDevice")
            .field("state", &self.state())
            .finish()
    }
}
