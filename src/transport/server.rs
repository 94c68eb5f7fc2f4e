//! WebSocket server for accepting a peer.
//!
//! The protocol is symmetric: once the socket is up, the accepting side can
//! call the connecting side exactly as the connecting side calls it.
//!
//! # Connection Flow
//!
//! 1. Bind the server to `localhost:0` (random port)
//! 2. Hand [`PendingServer::ws_url`] to the peer
//! 3. Peer connects, WebSocket upgrade completes
//! 4. [`Connection`] is returned in the `Open` state

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::connection::{Connection, ConnectionBuilder};
use crate::error::Result;

use super::TransportEvent;
use super::websocket::{self, WsTransport};

// ============================================================================
// PendingServer
// ============================================================================

/// A WebSocket server that is bound but not yet connected.
///
/// # Example
///
/// ```ignore
/// use std::net::{IpAddr, Ipv4Addr};
/// use wsrpc::transport::PendingServer;
///
/// let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
/// let ws_url = server.ws_url();
///
/// // Hand ws_url to the peer...
///
/// let connection = server.accept().await?;
/// ```
pub struct PendingServer {
    /// TCP listener for incoming connections.
    listener: TcpListener,
    /// Address the server is bound to.
    addr: SocketAddr,
}

impl PendingServer {
    /// Binds a WebSocket server to the specified address and port.
    ///
    /// Use port 0 to let the OS assign a random available port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let addr = listener.local_addr()?;

        debug!(port = addr.port(), "WebSocket server bound");

        Ok(Self { listener, addr })
    }

    /// Binds to `127.0.0.1` on a random port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if binding fails.
    pub async fn bind_localhost() -> Result<Self> {
        Self::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await
    }

    /// Returns the port the server is bound to.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Returns the local socket address.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the WebSocket URL for this server.
    ///
    /// Format: `ws://{ip}:{port}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Accepts one peer with default settings.
    ///
    /// # Errors
    ///
    /// See [`PendingServer::accept_with`].
    pub async fn accept(self) -> Result<Connection> {
        self.accept_with(Connection::builder()).await
    }

    /// Accepts one peer using the builder's options, listeners and error
    /// handler.
    ///
    /// The builder's `connect_timeout` bounds the wait for the peer.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`](crate::Error::Config) if the builder's options are invalid
    /// - [`Error::ConnectionFailure`](crate::Error::ConnectionFailure) if no peer connects in time or the
    ///   WebSocket upgrade fails
    pub async fn accept_with(self, builder: ConnectionBuilder) -> Result<Connection> {
        let accept_timeout = builder.options().connect_timeout;
        let (transport, command_rx) = WsTransport::channel();
        let connection = builder.build(transport)?;

        let (stream, peer) = match timeout(accept_timeout, self.listener.accept()).await {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(e)) => return Err(connection.fail_opening(e.to_string())),
            Err(_) => {
                return Err(connection.fail_opening(format!(
                    "no peer connected within {}ms",
                    accept_timeout.as_millis()
                )));
            }
        };

        debug!(%peer, "TCP connection accepted");

        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws_stream) => ws_stream,
            Err(e) => {
                return Err(connection.fail_opening(format!("WebSocket upgrade failed: {e}")));
            }
        };

        info!(port = self.addr.port(), %peer, "WebSocket connection accepted");

        connection.handle_event(TransportEvent::Open);
        websocket::spawn(ws_stream, command_rx, connection.downgrade());

        Ok(connection)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;

    use std::time::Duration;

    use crate::connection::Status;

    #[tokio::test]
    async fn test_server_bind_random_port() {
        let server = PendingServer::bind_localhost()
            .await
            .expect("bind should succeed");

        assert!(server.port() > 0);
        assert!(server.ws_url().starts_with("ws://127.0.0.1:"));
    }

    #[tokio::test]
    async fn test_server_ws_url_format() {
        let server = PendingServer::bind_localhost()
            .await
            .expect("bind should succeed");

        let expected = format!("ws://127.0.0.1:{}", server.port());
        assert_eq!(server.ws_url(), expected);
    }

    #[tokio::test]
    async fn test_server_local_addr() {
        let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind should succeed");

        let addr = server.local_addr();
        assert_eq!(addr.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(addr.port(), server.port());
    }

    #[tokio::test]
    async fn test_accept_timeout_reports_failure() {
        let server = PendingServer::bind_localhost()
            .await
            .expect("bind should succeed");

        let builder = Connection::builder().connect_timeout(Duration::from_millis(50));
        let err = server.accept_with(builder).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionFailure { .. }));
    }

    #[tokio::test]
    async fn test_accept_opens_connection() {
        let server = PendingServer::bind_localhost()
            .await
            .expect("bind should succeed");
        let url = server.ws_url();

        let (accepted, connected) = tokio::join!(server.accept(), crate::connect(&url));
        let accepted = accepted.expect("accept");
        let connected = connected.expect("connect");

        assert_eq!(accepted.status(), Status::Open);
        assert_eq!(connected.status(), Status::Open);
    }
}
