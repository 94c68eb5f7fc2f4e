//! Handler and listener registration methods.

use std::future::Future;

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::registry::{EventKind, Handler, Listener};

use super::Connection;

// ============================================================================
// Connection - Message Handlers
// ============================================================================

impl Connection {
    /// Registers the handler the peer reaches by calling `identifier`.
    ///
    /// Replaces any handler already registered under that identifier. The
    /// handler's output is the reply value when the caller used `waiter`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// connection.set_message_handler("echo", |args| async move {
    ///     format!("{}!", args[0].as_str().unwrap_or_default())
    /// });
    /// ```
    pub fn set_message_handler<F, Fut, R>(&self, identifier: impl Into<String>, handler: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        self.inner.handlers.set(identifier, Handler::new(handler));
    }

    /// Registers a handler that answers only the next call to `identifier`.
    ///
    /// The registration is gone before the handler runs; a second call
    /// arriving afterwards finds no handler and is dropped.
    pub fn once_message_handler<F, Fut, R>(&self, identifier: impl Into<String>, handler: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        self.inner.handlers.once(identifier, Handler::new(handler));
    }

    /// Removes the handler for `identifier`.
    ///
    /// Returns `false` if none was registered.
    pub fn remove_message_handler(&self, identifier: &str) -> bool {
        self.inner.handlers.remove(identifier)
    }

    /// Returns `true` if a handler is registered for `identifier`.
    #[inline]
    #[must_use]
    pub fn has_message_handler(&self, identifier: &str) -> bool {
        self.inner.handlers.contains(identifier)
    }
}

// ============================================================================
// Connection - Event Listeners
// ============================================================================

impl Connection {
    /// Adds a listener for local events of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateListener`](crate::Error::DuplicateListener)
    /// if this listener is already registered for `kind`.
    pub fn add_event_listener(&self, kind: EventKind, listener: Listener) -> Result<()> {
        self.inner.listeners.add(kind, listener)
    }

    /// Removes a listener. Safe to call when it is not registered.
    pub fn remove_event_listener(&self, kind: EventKind, listener: &Listener) -> bool {
        self.inner.listeners.remove(kind, listener)
    }

    /// Adds a listener that fires at most once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateListener`](crate::Error::DuplicateListener)
    /// if this listener is already registered for `kind`.
    pub fn once_event_listener(&self, kind: EventKind, listener: Listener) -> Result<()> {
        self.inner.listeners.once(kind, listener)
    }
}

// ============================================================================
// Tests
// ============================================================================
