//! Observer registry for transcoder notifications.
//!
//! Each [`Transcoder`](crate::Transcoder) owns one [`EventBus`]. Listeners are
//! kept per [`EventKind`] in registration order and invoked synchronously.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::progress::ProgressSnapshot;

/// The three notifications a transcoder emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Stdout,
    Stderr,
    Progress,
}

/// A notification payload, borrowed from the controller for the duration of
/// the callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TranscodeEvent<'a> {
    /// Raw stdout chunk, verbatim.
    Stdout(&'a str),
    /// Raw diagnostic chunk, verbatim, delivered before it is parsed.
    Stderr(&'a str),
    /// Copy of the progress snapshot after a diagnostic chunk was parsed.
    Progress(&'a ProgressSnapshot),
}

impl TranscodeEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            TranscodeEvent::Stdout(_) => EventKind::Stdout,
            TranscodeEvent::Stderr(_) => EventKind::Stderr,
            TranscodeEvent::Progress(_) => EventKind::Progress,
        }
    }
}

/// Listener callback.
pub type Listener = Arc<dyn Fn(TranscodeEvent<'_>) + Send + Sync>;

/// Token returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<(SubscriptionId, Listener)>>,
}

/// Per-instance map from event kind to an ordered listener list.
#[derive(Default)]
pub struct EventBus {
    registry: Mutex<Registry>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `kind`.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> SubscriptionId
    where
        F: Fn(TranscodeEvent<'_>) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry
            .listeners
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        for list in registry.listeners.values_mut() {
            if let Some(pos) = list.iter().position(|(sub, _)| *sub == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Total registered listeners across all kinds.
    pub fn listener_count(&self) -> usize {
        let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.listeners.values().map(Vec::len).sum()
    }

    /// Invoke every listener for the event's kind, in registration order.
    ///
    /// The listener list is snapshotted first, so listeners may subscribe or
    /// unsubscribe while being called without deadlocking.
    pub fn emit(&self, event: TranscodeEvent<'_>) {
        let listeners: Vec<Listener> = {
            let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            match registry.listeners.get(&event.kind()) {
                Some(list) => list.iter().map(|(_, l)| Arc::clone(l)).collect(),
                None => return,
            }
        };
        for listener in listeners {
            listener(event);
        }
    }
}
