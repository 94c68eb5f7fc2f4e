//! wsrpc - Bidirectional RPC over a single WebSocket.
//!
//! Both ends of the socket can register named handlers and call the
//! other end's handlers, either fire-and-forget or awaiting a reply.
//!
//! # Architecture
//!
//! Every frame is a JSON envelope:
//!
//! ```text
//! { "identifier": "echo", "message": ["hi"], "callbackId": "5c0e…" }
//! ```
//!
//! - **Calls**: `identifier` names the remote handler, `message` holds the
//!   positional arguments
//! - **Replies**: a call carrying `callbackId` is answered with a call whose
//!   `identifier` is that `callbackId`
//! - **Control**: identifiers starting with `@` are directives for the
//!   connection itself (`@SetCookie`, `@DelCookie`) and never reach handlers
//!
//! Key design principles:
//!
//! - Each [`Connection`] owns: WebSocket + event loop + handler table
//! - Status moves `OPENING` → `OPEN` → `CLOSED` | `ERROR`; the last two are
//!   terminal
//! - Unknown identifiers are dropped silently
//! - Event-driven (no polling)
//!
//! # Quick Start
//!
//! ```no_run
//! use wsrpc::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let connection = wsrpc::connect("ws://localhost:8080").await?;
//!
//!     // Answer calls from the peer
//!     connection.set_message_handler("echo", |args| async move {
//!         format!("{}!", args[0].as_str().unwrap_or_default())
//!     });
//!
//!     // Call the peer
//!     let reply: String = connection.waiter("echo", ("hi",)).await?;
//!     println!("peer replied {reply}");
//!
//!     connection.disconnect_async().await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`connection`] | [`Connection`], builder, options, status |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Correlation IDs |
//! | [`protocol`] | Envelope codec and control directives |
//! | [`registry`] | Handler table and listener registry |
//! | [`transport`] | WebSocket client, server and TLS |

// ============================================================================
// Modules
// ============================================================================

/// RPC connection, configuration and lifecycle.
///
/// Use [`connect()`] or [`Connection::builder()`] to open one.
pub mod connection;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Wire format.
///
/// Envelope encoding/decoding and `@` control directives.
pub mod protocol;

/// Handler table and event listener registry.
pub mod registry;

/// WebSocket transport layer.
///
/// Outbound client, accepting server and the [`Transport`](transport::Transport)
/// seam for injected transports.
pub mod transport;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Connection types
pub use connection::{
    Connection, ConnectionBuilder, ConnectionOptions, DEFAULT_CONNECT_TIMEOUT, ErrorHandler,
    Status,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::CorrelationId;

// Protocol types
pub use protocol::{ControlDirective, Envelope};

// Registry types
pub use registry::{ConnectionEvent, EventKind, Handler, Listener};

// Transport types
pub use transport::{PendingServer, Transport, TransportEvent};

// ============================================================================
// Entry Points
// ============================================================================

/// Connects to a WebSocket peer with default options.
///
/// Shorthand for `Connection::builder().connect(url)`. Use the builder to
/// set an error callback, timeouts or self-signed certificate acceptance.
///
/// # Errors
///
/// - [`Error::Config`] if the URL is invalid or not `ws://` / `wss://`
/// - [`Error::ConnectionFailure`] if the handshake fails or times out
pub async fn connect(url: &str) -> Result<Connection> {
    Connection::builder().connect(url).await
}

/// Connects with an optional error callback and self-signed certificate
/// acceptance.
///
/// The callback is installed before the handshake starts, so it also
/// receives a failure to connect.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> wsrpc::Result<()> {
/// use std::sync::Arc;
///
/// let on_error: wsrpc::ErrorHandler = Arc::new(|err: &wsrpc::Error| eprintln!("{err}"));
/// let connection = wsrpc::connect_with("wss://localhost:8443", Some(on_error), true).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// See [`connect()`].
pub async fn connect_with(
    url: &str,
    on_error: Option<ErrorHandler>,
    allow_self_signed_cert: bool,
) -> Result<Connection> {
    let mut builder = Connection::builder().allow_self_signed_cert(allow_self_signed_cert);
    if let Some(handler) = on_error {
        builder = builder.error_handler(handler);
    }
    builder.connect(url).await
}
