//! Message handler table.
//!
//! Maps an identifier to the callback invoked when the remote side calls it.
//! At most one handler exists per identifier; registering again replaces
//! the previous one.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{trace, warn};

use crate::protocol::CONTROL_SIGIL;

// ============================================================================
// Types
// ============================================================================

/// Future returned by a type-erased handler.
pub type HandlerFuture = BoxFuture<'static, Value>;

// ============================================================================
// Handler
// ============================================================================

/// A message handler callback.
///
/// Handlers receive the positional arguments of the inbound envelope and
/// return a future of any serializable value. Synchronous handlers return
/// `std::future::ready(value)` or an `async` block.
#[derive(Clone)]
pub struct Handler(Arc<dyn Fn(Vec<Value>) -> HandlerFuture + Send + Sync>);

impl Handler {
    /// Wraps a callback.
    pub fn new<F, Fut, R>(callback: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        Self(Arc::new(move |args| {
            let future = callback(args);
            Box::pin(async move {
                let result = future.await;
                serde_json::to_value(result).unwrap_or_else(|e| {
                    warn!(error = %e, "Handler result is not serializable, replying null");
                    Value::Null
                })
            })
        }))
    }

    /// Invokes the handler.
    #[inline]
    pub fn call(&self, args: Vec<Value>) -> HandlerFuture {
        (self.0)(args)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

// ============================================================================
// HandlerTable
// ============================================================================

struct Entry {
    handler: Handler,
    once: bool,
}

/// Per-connection identifier → handler table.
#[derive(Default)]
pub struct HandlerTable {
    entries: Mutex<FxHashMap<String, Entry>>,
}

impl HandlerTable {
    /// Creates an empty table.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a permanent handler.
    pub fn set(&self, identifier: impl Into<String>, handler: Handler) {
        self.insert(identifier.into(), handler, false);
    }

    /// Registers or replaces a handler that answers a single call.
    ///
    /// The entry is removed before the handler runs, so the handler may
    /// register a new one under the same identifier.
    pub fn once(&self, identifier: impl Into<String>, handler: Handler) {
        self.insert(identifier.into(), handler, true);
    }

    /// Removes a handler. Returns `false` if none was registered.
    pub fn remove(&self, identifier: &str) -> bool {
        self.entries.lock().remove(identifier).is_some()
    }

    /// Looks up the handler for an inbound call.
    ///
    /// One-shot entries are removed in the same step, so a second call
    /// racing the first finds nothing.
    pub fn take_for_dispatch(&self, identifier: &str) -> Option<Handler> {
        let mut entries = self.entries.lock();
        let once = entries.get(identifier)?.once;

        if once {
            entries.remove(identifier).map(|entry| entry.handler)
        } else {
            entries.get(identifier).map(|entry| entry.handler.clone())
        }
    }

    /// Returns `true` if a handler is registered under `identifier`.
    #[inline]
    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.lock().contains_key(identifier)
    }

    /// Returns the number of registered handlers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if no handler is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drops every handler.
    ///
    /// Handlers are dropped after the table lock is released.
    pub fn clear(&self) {
        let entries = std::mem::take(&mut *self.entries.lock());
        drop(entries);
    }

    fn insert(&self, identifier: String, handler: Handler, once: bool) {
        if identifier.starts_with(CONTROL_SIGIL) {
            warn!(%identifier, "Handler registered under a reserved identifier will never be called");
        }

        trace!(%identifier, once, "Handler registered");
        self.entries.lock().insert(identifier, Entry { handler, once });
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
