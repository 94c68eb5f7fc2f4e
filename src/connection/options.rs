//! Connection configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use wsrpc::ConnectionOptions;
//!
//! let options = ConnectionOptions::new()
//!     .with_connect_timeout(Duration::from_secs(5))
//!     .with_waiter_timeout(Duration::from_secs(10))
//!     .with_self_signed_cert();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default bound on the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Per-connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Bound on the handshake (client) or the wait for a peer (server).
    pub connect_timeout: Duration,

    /// Bound on every [`waiter`](crate::Connection::waiter) call.
    ///
    /// `None` waits until the reply arrives or the connection ends.
    pub waiter_timeout: Option<Duration>,

    /// Accept any certificate on `wss://` URLs.
    pub allow_self_signed_cert: bool,

    /// Maximum number of waiters outstanding at once.
    pub max_pending_waiters: Option<usize>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectionOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            waiter_timeout: None,
            allow_self_signed_cert: false,
            max_pending_waiters: None,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionOptions {
    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the default waiter timeout.
    #[inline]
    #[must_use]
    pub fn with_waiter_timeout(mut self, timeout: Duration) -> Self {
        self.waiter_timeout = Some(timeout);
        self
    }

    /// Accepts self-signed certificates on `wss://` URLs.
    #[inline]
    #[must_use]
    pub fn with_self_signed_cert(mut self) -> Self {
        self.allow_self_signed_cert = true;
        self
    }

    /// Caps the number of outstanding waiters.
    #[inline]
    #[must_use]
    pub fn with_max_pending_waiters(mut self, max: usize) -> Self {
        self.max_pending_waiters = Some(max);
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero timeout or a zero waiter cap.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect_timeout must be greater than zero"));
        }

        if self.waiter_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config("waiter_timeout must be greater than zero"));
        }

        if self.max_pending_waiters == Some(0) {
            return Err(Error::config("max_pending_waiters must be greater than zero"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
