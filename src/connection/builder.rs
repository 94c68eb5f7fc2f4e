//! Builder pattern for connection configuration.
//!
//! Provides a fluent API for configuring and opening [`Connection`]s.
//! Listeners registered on the builder are in place before the first
//! status transition, so they observe `OPEN` (or `ERROR`) from the start.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use wsrpc::{Connection, EventKind, Listener};
//!
//! # async fn example() -> wsrpc::Result<()> {
//! let connection = Connection::builder()
//!     .waiter_timeout(Duration::from_secs(10))
//!     .on_error(|err| eprintln!("connection error: {err}"))
//!     .listener(EventKind::StatusChange, Listener::new(|event| println!("{event:?}")))
//!     .connect("ws://localhost:8080")
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};
use crate::registry::{EventKind, Listener};
use crate::transport::websocket::{self, WsTransport};
use crate::transport::{Transport, TransportEvent, tls};

use super::core::ErrorHandler;
use super::{Connection, ConnectionOptions};

// ============================================================================
// ConnectionBuilder
// ============================================================================

/// Builder for configuring a [`Connection`].
///
/// Use [`Connection::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ConnectionBuilder {
    /// Connection settings.
    options: ConnectionOptions,
    /// Error callback installed before opening.
    error_handler: Option<ErrorHandler>,
    /// Listeners registered before opening.
    listeners: Vec<(EventKind, Listener)>,
}

impl fmt::Debug for ConnectionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionBuilder")
            .field("options", &self.options)
            .field("error_handler", &self.error_handler.is_some())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

// ============================================================================
// ConnectionBuilder - Configuration
// ============================================================================

impl ConnectionBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the options configured so far.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Replaces all options.
    #[inline]
    #[must_use]
    pub fn with_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Sets the default timeout for every waiter.
    #[inline]
    #[must_use]
    pub fn waiter_timeout(mut self, timeout: Duration) -> Self {
        self.options.waiter_timeout = Some(timeout);
        self
    }

    /// Accepts self-signed certificates on `wss://` URLs.
    #[inline]
    #[must_use]
    pub fn allow_self_signed_cert(mut self, allow: bool) -> Self {
        self.options.allow_self_signed_cert = allow;
        self
    }

    /// Caps the number of outstanding waiters.
    #[inline]
    #[must_use]
    pub fn max_pending_waiters(mut self, max: usize) -> Self {
        self.options.max_pending_waiters = Some(max);
        self
    }

    /// Sets the error callback.
    #[must_use]
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.error_handler(Arc::new(handler))
    }

    /// Sets an already shared error callback.
    #[inline]
    #[must_use]
    pub fn error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Registers a listener before the connection opens.
    #[must_use]
    pub fn listener(mut self, kind: EventKind, listener: Listener) -> Self {
        self.listeners.push((kind, listener));
        self
    }
}

// ============================================================================
// ConnectionBuilder - Opening
// ============================================================================

impl ConnectionBuilder {
    /// Builds a connection in `Opening` state over any transport.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the options are invalid
    /// - [`Error::DuplicateListener`] if a listener was added twice for the
    ///   same event kind
    pub fn build(self, transport: impl Transport) -> Result<Connection> {
        self.options.validate()?;

        let connection = Connection::from_parts(Arc::new(transport), self.options);

        if let Some(handler) = self.error_handler {
            connection.set_error_handler_arc(handler);
        }

        for (kind, listener) in self.listeners {
            connection.add_event_listener(kind, listener)?;
        }

        Ok(connection)
    }

    /// Connects to a WebSocket peer.
    ///
    /// Resolves once the handshake completes and the status is `Open`. On
    /// failure the status moves to `Error`, the error callback receives the
    /// failure, and the same failure is returned.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the options or the URL are invalid
    /// - [`Error::ConnectionFailure`] if the handshake fails or times out
    pub async fn connect(self, url: &str) -> Result<Connection> {
        let parsed = Url::parse(url).map_err(|e| Error::config(format!("Invalid URL {url}: {e}")))?;
        let secure = match parsed.scheme() {
            "ws" => false,
            "wss" => true,
            other => return Err(Error::config(format!("Unsupported URL scheme: {other}"))),
        };

        let connector = if secure && self.options.allow_self_signed_cert {
            debug!("Accepting self-signed certificates");
            Some(tls::self_signed_connector()?)
        } else {
            None
        };

        let connect_timeout = self.options.connect_timeout;
        let (transport, command_rx) = WsTransport::channel();
        let connection = self.build(transport)?;

        let handshake =
            tokio_tungstenite::connect_async_tls_with_config(url, None, false, connector);

        let ws_stream = match timeout(connect_timeout, handshake).await {
            Ok(Ok((ws_stream, _response))) => ws_stream,
            Ok(Err(e)) => return Err(connection.fail_opening(e.to_string())),
            Err(_) => {
                return Err(connection.fail_opening(format!(
                    "handshake timed out after {}ms",
                    connect_timeout.as_millis()
                )));
            }
        };

        info!(%url, "WebSocket connection established");

        connection.handle_event(TransportEvent::Open);
        websocket::spawn(ws_stream, command_rx, connection.downgrade());

        Ok(connection)
    }
}

// ============================================================================
// Tests
// ============================================================================
