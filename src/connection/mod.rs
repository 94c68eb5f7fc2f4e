//! RPC connection over a WebSocket.
//!
//! Each [`Connection`] owns a transport, a handler table, a listener
//! registry and a status. Clones share all of them.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | Connection struct, state machine, disconnect |
//! | `builder` | Fluent configuration and `connect` |
//! | `options` | Timeouts and TLS settings |
//! | `status` | `OPENING` / `OPEN` / `CLOSED` / `ERROR` |
//! | `callbacks` | Handler and listener registration |
//! | `waiter` | `send` and request/reply correlation |
//! | `dispatch` | Inbound message routing and replies |
//!
//! # Example
//!
//! ```ignore
//! let connection = wsrpc::connect("ws://localhost:8080").await?;
//!
//! // Answer calls from the peer
//! connection.set_message_handler("echo", |args| async move { args });
//!
//! // Call the peer and await its reply
//! let reply: String = connection.waiter("greet", ("hi",)).await?;
//!
//! // Fire and forget
//! connection.send("log", ("done",))?;
//! ```

// ============================================================================
// Submodules
// ============================================================================

mod builder;
mod callbacks;
mod core;
mod dispatch;
mod options;
mod status;
mod waiter;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ConnectionBuilder;
pub use core::{Connection, ErrorHandler};
pub use options::{ConnectionOptions, DEFAULT_CONNECT_TIMEOUT};
pub use status::Status;

pub(crate) use core::ConnectionInner;
