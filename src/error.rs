//! Error types for wsrpc.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use wsrpc::{Connection, Result};
//!
//! async fn example(connection: &Connection) -> Result<()> {
//!     let greeting: String = connection.waiter("echo", ("hi",)).await?;
//!     connection.send("log", (greeting,))?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants | Surfaced |
//! |----------|----------|----------|
//! | Programmer | [`Error::NonSerializableArgument`], [`Error::DuplicateListener`], [`Error::Config`] | Synchronously at the call site |
//! | Remote | [`Error::MalformedEnvelope`] | Logged, message discarded |
//! | Connection | [`Error::ConnectionFailure`], [`Error::ConnectionClosed`], [`Error::WaiterTimeout`] | Error handler, status listeners, `connect` |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] | Wrapped |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::CorrelationId;
use crate::registry::EventKind;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when connection options are invalid or a configured limit
    /// is exceeded.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport could not be established or failed.
    #[error("Connection failed: {message}")]
    ConnectionFailure {
        /// Description of the failure.
        message: String,
    },

    /// Connection is closed or closing.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A waiter did not receive its reply in time.
    #[error("Waiter {correlation_id} timed out after {timeout_ms}ms")]
    WaiterTimeout {
        /// Correlation ID of the abandoned call.
        correlation_id: CorrelationId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// An outbound argument could not be serialized.
    #[error("Non-serializable argument: {message}")]
    NonSerializableArgument {
        /// Serializer error message.
        message: String,
    },

    /// Inbound text is not a valid envelope.
    #[error("Malformed envelope: {message}")]
    MalformedEnvelope {
        /// What was wrong with the text.
        message: String,
    },

    // ========================================================================
    // Registry Errors
    // ========================================================================
    /// The same listener is already registered for this event kind.
    #[error("Listener already registered for {kind}")]
    DuplicateListener {
        /// Event kind of the rejected registration.
        kind: EventKind,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection failure error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionFailure {
            message: message.into(),
        }
    }

    /// Creates a waiter timeout error.
    #[inline]
    pub fn waiter_timeout(correlation_id: CorrelationId, timeout_ms: u64) -> Self {
        Self::WaiterTimeout {
            correlation_id,
            timeout_ms,
        }
    }

    /// Creates a non-serializable argument error.
    #[inline]
    pub fn non_serializable(message: impl Into<String>) -> Self {
        Self::NonSerializableArgument {
            message: message.into(),
        }
    }

    /// Creates a malformed envelope error.
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            message: message.into(),
        }
    }

    /// Creates a duplicate listener error.
    #[inline]
    pub fn duplicate_listener(kind: EventKind) -> Self {
        Self::DuplicateListener { kind }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::WaiterTimeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailure { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
                | Self::ChannelClosed(_)
        )
    }

    /// Returns `true` if this error indicates a mistake by the caller.
    ///
    /// These are raised synchronously and never reach the error handler.
    #[inline]
    #[must_use]
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Self::NonSerializableArgument { .. }
                | Self::DuplicateListener { .. }
                | Self::Config { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
