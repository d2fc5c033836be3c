//! EventHub: the subscription registry for everything the poll loop reports.
//!
//! # Why callbacks and not a channel? (for beginners)
//!
//! The poll loop does not buffer anything: a stroke is handed to whoever is
//! listening at the moment it is decoded and then forgotten.  A plain list of
//! callbacks per event kind models that directly.  Handlers run on the poll
//! task itself, one after the other in registration order, so a slow handler
//! delays the next poll.  Consumers that need to hand work elsewhere can push
//! into their own channel from inside the handler.
//!
//! # Re-entrancy
//!
//! Emitting takes a snapshot of the handler list and releases the lock before
//! calling anything, so a handler may subscribe or unsubscribe (including
//! itself) from inside its own callback without deadlocking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use steno_core::Stroke;
use tracing::trace;

use super::protocol_engine::SequenceMismatch;
use super::transport::TransferError;

/// Handle returned by every `subscribe_*` method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct HandlerList<T> {
    entries: Mutex<Vec<(SubscriptionId, Handler<T>)>>,
}

impl<T> HandlerList<T> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Handler<T>)>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, id: SubscriptionId, handler: Handler<T>) {
        self.lock().push((id, handler));
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    fn emit(&self, value: &T) {
        let snapshot: Vec<Handler<T>> = self.lock().iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in snapshot {
            handler(value);
        }
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// One ordered handler list per event kind.
pub struct EventHub {
    next_id: AtomicU64,
    stroke: HandlerList<Stroke>,
    transport_error: HandlerList<TransferError>,
    incorrect_byte_count: HandlerList<usize>,
    incorrect_sequence_number: HandlerList<SequenceMismatch>,
    no_data: HandlerList<()>,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            stroke: HandlerList::new(),
            transport_error: HandlerList::new(),
            incorrect_byte_count: HandlerList::new(),
            incorrect_sequence_number: HandlerList::new(),
            no_data: HandlerList::new(),
        }
    }

    fn allocate_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Called once per decoded stroke, in payload order.
    pub fn subscribe_stroke<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Stroke) + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.stroke.push(id, Arc::new(handler));
        id
    }

    /// Called when a bulk transfer fails.
    pub fn subscribe_transport_error<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&TransferError) + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.transport_error.push(id, Arc::new(handler));
        id
    }

    /// Called with the number of bytes received when a response is too
    /// short for its header or its declared payload.
    pub fn subscribe_incorrect_byte_count<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&usize) + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.incorrect_byte_count.push(id, Arc::new(handler));
        id
    }

    /// Called when a response echoes an unexpected sequence number.
    pub fn subscribe_incorrect_sequence_number<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&SequenceMismatch) + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.incorrect_sequence_number.push(id, Arc::new(handler));
        id
    }

    /// Called when the machine reports an empty stroke buffer.
    pub fn subscribe_no_data<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.no_data.push(id, Arc::new(move |_: &()| handler()));
        id
    }

    /// Removes a subscription.  Returns `false` if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.stroke.remove(id)
            || self.transport_error.remove(id)
            || self.incorrect_byte_count.remove(id)
            || self.incorrect_sequence_number.remove(id)
            || self.no_data.remove(id);
        trace!(?id, removed, "unsubscribe");
        removed
    }

    /// Total number of live subscriptions across all event kinds.
    pub fn subscriber_count(&self) -> usize {
        self.stroke.len()
            + self.transport_error.len()
            + self.incorrect_byte_count.len()
            + self.incorrect_sequence_number.len()
            + self.no_data.len()
    }

    pub(crate) fn emit_stroke(&self, stroke: &Stroke) {
        self.stroke.emit(stroke);
    }

    pub(crate) fn emit_transport_error(&self, error: &TransferError) {
        self.transport_error.emit(error);
    }

    pub(crate) fn emit_incorrect_byte_count(&self, received: usize) {
        self.incorrect_byte_count.emit(&received);
    }

    pub(crate) fn emit_incorrect_sequence_number(&self, mismatch: &SequenceMismatch) {
        self.incorrect_sequence_number.emit(mismatch);
    }

    pub(crate) fn emit_no_data(&self) {
        self.no_data.emit(&());
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
