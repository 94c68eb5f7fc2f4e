//! Local event listener registry.
//!
//! Listeners observe local lifecycle events of a connection. They are never
//! triggered by the remote peer directly.
//!
//! | Event | Fires | Payload |
//! |-------|-------|---------|
//! | [`EventKind::StatusChange`] | After every status transition | New [`Status`] |
//! | [`EventKind::Message`] | Once per ordinary inbound envelope | Decoded [`Envelope`] |
//! | [`EventKind::RawMessage`] | Once per inbound frame, before decoding | Raw text |
//!
//! Listeners are compared by identity: clone a [`Listener`] to keep a handle
//! for later removal.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{error, trace};

use crate::connection::Status;
use crate::error::{Error, Result};
use crate::protocol::Envelope;

// ============================================================================
// EventKind
// ============================================================================

/// Kind of local event a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Connection status changed.
    StatusChange,
    /// Ordinary envelope received.
    Message,
    /// Raw frame received.
    RawMessage,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StatusChange => "status-change",
            Self::Message => "message",
            Self::RawMessage => "raw-message",
        };
        f.write_str(name)
    }
}

// ============================================================================
// ConnectionEvent
// ============================================================================

/// A local event with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// New connection status.
    StatusChange(Status),
    /// Decoded inbound envelope.
    Message(Envelope),
    /// Undecoded inbound text.
    RawMessage(String),
}

impl ConnectionEvent {
    /// Returns the kind of this event.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::StatusChange(_) => EventKind::StatusChange,
            Self::Message(_) => EventKind::Message,
            Self::RawMessage(_) => EventKind::RawMessage,
        }
    }
}

// ============================================================================
// Listener
// ============================================================================

/// A listener callback.
///
/// Two `Listener`s are equal only if one is a clone of the other.
#[derive(Clone)]
pub struct Listener(Arc<dyn Fn(&ConnectionEvent) + Send + Sync>);

impl Listener {
    /// Wraps a callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    #[inline]
    fn call(&self, event: &ConnectionEvent) {
        (self.0)(event);
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

// ============================================================================
// Registration
// ============================================================================

/// One registered listener.
///
/// One-shot registrations keep the caller's own handle, so removal by that
/// handle works whether or not the listener was registered with `once`.
struct Registration {
    listener: Listener,
    once: bool,
}

// ============================================================================
// ListenerRegistry
// ============================================================================

/// Per-connection registry of event listeners.
///
/// Each event kind maps to listeners in insertion order; a kind with no
/// listeners has no entry at all.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Mutex<FxHashMap<EventKind, Vec<Registration>>>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateListener`] if this exact listener is already
    /// registered for `kind`.
    pub fn add(&self, kind: EventKind, listener: Listener) -> Result<()> {
        self.insert(kind, listener, false)
    }

    /// Appends a listener that is removed right before its first invocation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateListener`] if this exact listener is already
    /// registered for `kind`.
    pub fn once(&self, kind: EventKind, listener: Listener) -> Result<()> {
        self.insert(kind, listener, true)
    }

    /// Removes a listener.
    ///
    /// Returns `false` if nothing was registered; never fails.
    pub fn remove(&self, kind: EventKind, listener: &Listener) -> bool {
        let mut entries = self.entries.lock();

        let Some(registrations) = entries.get_mut(&kind) else {
            return false;
        };

        let before = registrations.len();
        registrations.retain(|r| r.listener != *listener);
        let removed = registrations.len() != before;

        if registrations.is_empty() {
            entries.remove(&kind);
        }

        removed
    }

    /// Invokes every listener registered for the event's kind.
    ///
    /// Listeners run synchronously in insertion order. A listener removed by
    /// an earlier one during the same notification is skipped. A panicking
    /// listener is logged and does not stop the others.
    pub fn notify(&self, event: &ConnectionEvent) {
        let kind = event.kind();

        let snapshot: Vec<Listener> = match self.entries.lock().get(&kind) {
            Some(registrations) => registrations.iter().map(|r| r.listener.clone()).collect(),
            None => return,
        };

        trace!(%kind, count = snapshot.len(), "Notifying listeners");

        for listener in snapshot {
            if !self.claim(kind, &listener) {
                continue;
            }

            if catch_unwind(AssertUnwindSafe(|| listener.call(event))).is_err() {
                error!(%kind, "Listener panicked");
            }
        }
    }

    /// Returns the number of listeners for `kind`.
    #[inline]
    #[must_use]
    pub fn len(&self, kind: EventKind) -> usize {
        self.entries.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Returns `true` if no listener is registered for any kind.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drops every registration.
    pub fn clear(&self) {
        let entries = std::mem::take(&mut *self.entries.lock());
        drop(entries);
    }

    fn insert(&self, kind: EventKind, listener: Listener, once: bool) -> Result<()> {
        let mut entries = self.entries.lock();
        let registrations = entries.entry(kind).or_default();

        if registrations.iter().any(|r| r.listener == listener) {
            return Err(Error::duplicate_listener(kind));
        }

        registrations.push(Registration { listener, once });
        Ok(())
    }

    /// Confirms `listener` is still registered, consuming it if one-shot.
    fn claim(&self, kind: EventKind, listener: &Listener) -> bool {
        let mut entries = self.entries.lock();

        let Some(registrations) = entries.get_mut(&kind) else {
            return false;
        };

        let Some(index) = registrations.iter().position(|r| r.listener == *listener) else {
            return false;
        };

        if registrations[index].once {
            registrations.remove(index);
            if registrations.is_empty() {
                entries.remove(&kind);
            }
        }

        true
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock();
        let mut map = f.debug_map();
        for (kind, registrations) in entries.iter() {
            map.entry(kind, &registrations.len());
        }
        map.finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
