//! Transport layer.
//!
//! A connection talks to its peer through an injected [`Transport`] and is
//! fed lifecycle events as [`TransportEvent`]s. The WebSocket implementation
//! in this module is the one used by [`connect`](crate::connect) and
//! [`PendingServer`]; any other duplex text channel can be plugged in with
//! [`Connection::with_transport`](crate::Connection::with_transport).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌──────────────────┐
//! │  Connection      │                              │  Connection      │
//! │  (client)        │         WebSocket            │  (server)        │
//! │  connect(url)    │◄────────────────────────────►│  PendingServer   │
//! │  → event loop    │      one envelope/frame      │  → event loop    │
//! └──────────────────┘                              └──────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `server` | WebSocket server binding and acceptance |
//! | `tls` | TLS connector accepting self-signed certificates |
//! | `websocket` | WebSocket transport and event loop |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket server accepting peer connections.
pub mod server;

/// TLS configuration for self-signed certificates.
pub mod tls;

/// WebSocket transport and event loop.
pub mod websocket;

// ============================================================================
// Imports
// ============================================================================

use crate::error::Result;

// ============================================================================
// Close Codes
// ============================================================================

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close frame carried no status code.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Peer removed this endpoint from the session.
pub const CLOSE_KICKED: u16 = 4001;

/// Peer refuses this endpoint permanently.
pub const CLOSE_BANNED: u16 = 4003;

// ============================================================================
// Transport
// ============================================================================

/// Outbound half of a duplex text channel.
///
/// Implementations must not block; `send` queues the frame.
pub trait Transport: Send + Sync + 'static {
    /// Queues one text frame for the peer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed)
    /// if the channel is gone.
    fn send(&self, text: String) -> Result<()>;

    /// Requests the channel to close.
    ///
    /// Completion is reported later as [`TransportEvent::Close`].
    fn close(&self);
}

// ============================================================================
// TransportEvent
// ============================================================================

/// Inbound lifecycle event of a transport.
///
/// Each transition is delivered exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Channel is open.
    Open,
    /// One text frame from the peer.
    Message(String),
    /// Channel closed.
    Close {
        /// Close code.
        code: u16,
        /// Close reason (may be empty).
        reason: String,
    },
    /// Channel failed.
    Error(String),
}

// ============================================================================
// Re-exports
// ============================================================================

pub use server::PendingServer;
pub use websocket::WsTransport;
