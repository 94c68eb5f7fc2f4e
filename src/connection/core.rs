//! Core Connection struct, state machine and lifecycle.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::registry::{ConnectionEvent, EventKind, HandlerTable, Listener, ListenerRegistry};
use crate::transport::{CLOSE_BANNED, CLOSE_KICKED, Transport, TransportEvent};

use super::{ConnectionBuilder, ConnectionOptions, Status};

// ============================================================================
// Types
// ============================================================================

/// Error callback type.
///
/// Receives transport failures and the reasons of peer-initiated
/// kick/ban closes.
pub type ErrorHandler = Arc<dyn Fn(&Error) + Send + Sync>;

/// Internal shared state for a connection.
pub(crate) struct ConnectionInner {
    /// Current status.
    status: Mutex<Status>,
    /// Set once `disconnect` has been requested.
    closing: AtomicBool,
    /// Set after the first transport error has been logged.
    error_logged: AtomicBool,
    /// Outbound half of the transport.
    pub transport: Arc<dyn Transport>,
    /// Remote-callable handlers.
    pub handlers: HandlerTable,
    /// Local event listeners.
    pub listeners: ListenerRegistry,
    /// Optional error callback.
    error_handler: Mutex<Option<ErrorHandler>>,
    /// Cookies set by the peer's control directives.
    pub cookies: Mutex<FxHashMap<String, String>>,
    /// Outstanding waiters.
    pub pending_waiters: AtomicUsize,
    /// Settings.
    pub options: ConnectionOptions,
}

// ============================================================================
// Connection
// ============================================================================

/// A handle to an RPC connection.
///
/// Cheap to clone; all clones share the same handlers, listeners and
/// status. The connection closes when [`Connection::disconnect`] is called,
/// the peer closes, or the last handle is dropped.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> wsrpc::Result<()> {
/// let connection = wsrpc::connect("ws://localhost:8080").await?;
///
/// connection.set_message_handler("ping", |_| async { "pong" });
///
/// let sum: i64 = connection.waiter("add", (1, 2)).await?;
/// connection.send("log", (format!("sum = {sum}"),))?;
///
/// connection.disconnect_async().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Connection {
    /// Shared inner state.
    pub(crate) inner: Arc<ConnectionInner>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("status", &self.status())
            .field("handlers", &self.inner.handlers.len())
            .field("pending_waiters", &self.pending_waiters())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Connection - Constructors
// ============================================================================

impl Connection {
    /// Creates a builder for configuring a new connection.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Creates a connection over an injected transport.
    ///
    /// The connection starts in [`Status::Opening`]. Feed the transport's
    /// lifecycle into [`Connection::handle_event`].
    ///
    /// Handler futures that are still pending after their first poll run on
    /// the current tokio runtime. Outside one they are logged and dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `options` are invalid.
    pub fn with_transport(
        transport: impl Transport,
        options: ConnectionOptions,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self::from_parts(Arc::new(transport), options))
    }

    pub(crate) fn from_parts(transport: Arc<dyn Transport>, options: ConnectionOptions) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                status: Mutex::new(Status::Opening),
                closing: AtomicBool::new(false),
                error_logged: AtomicBool::new(false),
                transport,
                handlers: HandlerTable::new(),
                listeners: ListenerRegistry::new(),
                error_handler: Mutex::new(None),
                cookies: Mutex::new(FxHashMap::default()),
                pending_waiters: AtomicUsize::new(0),
                options,
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<ConnectionInner> {
        Arc::downgrade(&self.inner)
    }

    /// Moves an opening connection to `Error` and returns the failure.
    pub(crate) fn fail_opening(&self, message: impl Into<String>) -> Error {
        let message = message.into();
        self.inner
            .handle_event(TransportEvent::Error(message.clone()));
        Error::connection(message)
    }
}

// ============================================================================
// Connection - Accessors
// ============================================================================

impl Connection {
    /// Returns the current status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> Status {
        self.inner.status()
    }

    /// Returns `true` if the connection is open and not closing.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.is_usable()
    }

    /// Returns the connection's settings.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.inner.options
    }

    /// Returns the number of waiters still expecting a reply.
    #[inline]
    #[must_use]
    pub fn pending_waiters(&self) -> usize {
        self.inner.pending_waiters.load(Ordering::SeqCst)
    }

    /// Returns a cookie set by the peer.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.inner.cookies.lock().get(name).cloned()
    }

    /// Returns all cookies set by the peer.
    #[must_use]
    pub fn cookies(&self) -> FxHashMap<String, String> {
        self.inner.cookies.lock().clone()
    }
}

// ============================================================================
// Connection - Lifecycle
// ============================================================================

impl Connection {
    /// Delivers a transport lifecycle event.
    ///
    /// Transports built into this crate call this themselves; injected
    /// transports must call it for every open, message, close and error.
    pub fn handle_event(&self, event: TransportEvent) {
        self.inner.handle_event(event);
    }

    /// Sets the error callback, replacing any previous one.
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        *self.inner.error_handler.lock() = Some(Arc::new(handler));
    }

    /// Removes the error callback.
    pub fn clear_error_handler(&self) {
        *self.inner.error_handler.lock() = None;
    }

    pub(crate) fn set_error_handler_arc(&self, handler: ErrorHandler) {
        *self.inner.error_handler.lock() = Some(handler);
    }

    /// Requests the transport to close.
    ///
    /// Completion is reported through the status-change listeners. Messages
    /// arriving after this call are not dispatched. Calling it on a closed
    /// connection does nothing.
    pub fn disconnect(&self) {
        let status = self.status();
        if status.is_terminal() {
            info!(%status, "Disconnect requested on a connection that is already closed");
            return;
        }

        if self.inner.closing.swap(true, Ordering::SeqCst) {
            debug!("Disconnect already in progress");
            return;
        }

        debug!("Disconnecting");
        self.inner.transport.close();
    }

    /// Requests the transport to close and waits until it has.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if the connection is dropped before
    /// reaching a terminal status.
    pub async fn disconnect_async(&self) -> Result<()> {
        if self.status().is_terminal() {
            return Ok(());
        }

        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        let listener = Listener::new(move |event| {
            if let ConnectionEvent::StatusChange(status) = event
                && status.is_terminal()
                && let Some(tx) = slot.lock().take()
            {
                let _ = tx.send(*status);
            }
        });
        self.inner
            .listeners
            .add(EventKind::StatusChange, listener.clone())?;

        // Terminal status may have landed before the listener was added.
        if self.status().is_terminal() {
            self.inner
                .listeners
                .remove(EventKind::StatusChange, &listener);
            return Ok(());
        }

        self.disconnect();
        let status = rx.await?;
        debug!(%status, "Disconnect completed");
        Ok(())
    }
}

// ============================================================================
// ConnectionInner - State Machine
// ============================================================================

impl ConnectionInner {
    #[inline]
    pub(crate) fn status(&self) -> Status {
        *self.status.lock()
    }

    /// Open and not closing.
    #[inline]
    pub(crate) fn is_usable(&self) -> bool {
        self.status() == Status::Open && !self.closing.load(Ordering::SeqCst)
    }

    /// Terminal or closing.
    #[inline]
    pub(crate) fn is_shutting_down(&self) -> bool {
        self.closing.load(Ordering::SeqCst) || self.status().is_terminal()
    }

    pub(crate) fn handle_event(&self, event: TransportEvent) {
        if !matches!(event, TransportEvent::Message(_)) && self.status().is_terminal() {
            debug!(?event, "Ignoring transport event after terminal status");
            return;
        }

        match event {
            TransportEvent::Open => {
                info!("Connection open");
                self.transition(Status::Open);
            }

            TransportEvent::Message(text) => self.dispatch(text),

            TransportEvent::Close { code, reason } => {
                match code {
                    CLOSE_BANNED => {
                        warn!(code, %reason, "Connection closed: banned by peer");
                        self.report_error(&Error::connection(reason));
                    }
                    CLOSE_KICKED => {
                        warn!(code, %reason, "Connection closed: kicked by peer");
                        self.report_error(&Error::connection(reason));
                    }
                    _ => info!(code, %reason, "Connection closed"),
                }
                self.transition(Status::Closed);
            }

            TransportEvent::Error(info) => {
                if self.error_logged.swap(true, Ordering::SeqCst) {
                    debug!(error = %info, "Transport error");
                } else {
                    error!(error = %info, "Transport error");
                }
                self.report_error(&Error::connection(info));
                self.transition(Status::Error);
            }
        }
    }

    /// Moves to `next` and notifies status listeners.
    ///
    /// Returns `false` if the transition is not allowed.
    fn transition(&self, next: Status) -> bool {
        {
            let mut status = self.status.lock();
            if !status.can_transition_to(next) {
                debug!(from = %*status, to = %next, "Ignoring status transition");
                return false;
            }
            *status = next;
        }

        debug!(status = %next, "Status changed");
        self.listeners.notify(&ConnectionEvent::StatusChange(next));

        if next.is_terminal() {
            self.handlers.clear();
            self.listeners.clear();
        }

        true
    }

    fn report_error(&self, err: &Error) {
        let handler = self.error_handler.lock().clone();
        if let Some(handler) = handler {
            handler(err);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
