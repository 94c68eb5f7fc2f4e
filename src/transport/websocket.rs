//! WebSocket transport and event loop.
//!
//! Each connection owns one spawned tokio task that handles:
//!
//! - Incoming text frames, forwarded to the connection's dispatch loop
//! - Outgoing frames queued through [`WsTransport`]
//! - Close requests and the closing handshake
//!
//! The task holds only a weak reference to the connection. When every
//! [`Connection`](crate::Connection) handle is dropped, the command channel
//! closes and the task shuts the socket down.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Weak;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

use crate::connection::ConnectionInner;
use crate::error::{Error, Result};

use super::{CLOSE_ABNORMAL, CLOSE_NO_STATUS, CLOSE_NORMAL, Transport, TransportEvent};

// ============================================================================
// TransportCommand
// ============================================================================

/// Internal commands for the event loop.
#[derive(Debug)]
pub(crate) enum TransportCommand {
    /// Send one text frame.
    Send(String),
    /// Start the closing handshake.
    Close,
}

// ============================================================================
// WsTransport
// ============================================================================

/// [`Transport`] backed by a WebSocket event loop task.
#[derive(Debug, Clone)]
pub struct WsTransport {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<TransportCommand>,
}

impl WsTransport {
    /// Creates the transport handle and the receiver for its event loop.
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<TransportCommand>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        (Self { command_tx }, command_rx)
    }
}

impl Transport for WsTransport {
    fn send(&self, text: String) -> Result<()> {
        self.command_tx
            .send(TransportCommand::Send(text))
            .map_err(|_| Error::ConnectionClosed)
    }

    fn close(&self) {
        let _ = self.command_tx.send(TransportCommand::Close);
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Spawns the event loop for an established WebSocket.
pub(crate) fn spawn<S>(
    ws_stream: WebSocketStream<S>,
    command_rx: mpsc::UnboundedReceiver<TransportCommand>,
    connection: Weak<ConnectionInner>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(run_event_loop(ws_stream, command_rx, connection));
}

/// Event loop that handles WebSocket I/O.
async fn run_event_loop<S>(
    ws_stream: WebSocketStream<S>,
    mut command_rx: mpsc::UnboundedReceiver<TransportCommand>,
    connection: Weak<ConnectionInner>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut ws_write, mut ws_read) = ws_stream.split();
    let mut closing = false;

    let final_event = loop {
        tokio::select! {
            // Incoming frames from the peer
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        let Some(inner) = connection.upgrade() else {
                            debug!("Connection dropped, stopping event loop");
                            let _ = ws_write.close().await;
                            break None;
                        };
                        trace!(len = text.len(), "Frame received");
                        inner.handle_event(TransportEvent::Message(text.as_str().to_owned()));
                    }

                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                            .unwrap_or((CLOSE_NO_STATUS, String::new()));
                        debug!(code, %reason, "WebSocket close frame received");
                        break Some(TransportEvent::Close { code, reason });
                    }

                    Some(Err(e)) if closing => {
                        debug!(error = %e, "WebSocket error during close");
                        break Some(TransportEvent::Close { code: CLOSE_NORMAL, reason: String::new() });
                    }

                    Some(Err(e)) => {
                        break Some(TransportEvent::Error(e.to_string()));
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        let code = if closing { CLOSE_NORMAL } else { CLOSE_ABNORMAL };
                        break Some(TransportEvent::Close { code, reason: String::new() });
                    }

                    // Ignore Binary, Ping, Pong
                    _ => {}
                }
            }

            // Commands from the connection
            command = command_rx.recv(), if !closing => {
                match command {
                    Some(TransportCommand::Send(text)) => {
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            warn!(error = %e, "Failed to send frame");
                        }
                    }

                    Some(TransportCommand::Close) | None => {
                        debug!("Starting WebSocket close handshake");
                        closing = true;
                        if let Err(e) = ws_write.close().await {
                            debug!(error = %e, "Failed to send close frame");
                        }
                    }
                }
            }
        }
    };

    if let Some(event) = final_event
        && let Some(inner) = connection.upgrade()
    {
        inner.handle_event(event);
    }

    debug!("Event loop terminated");
}

// ============================================================================
// Tests
// ============================================================================
